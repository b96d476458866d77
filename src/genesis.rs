use aioracle_engine::{FormatSupport, OracleEngine, Role};
use aioracle_token::{parse_units, AiToken, TokenLedger, DEFAULT_DECIMALS};
use aioracle_types::{Address, FormatPair, FormatTag, ModelId, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Initial oracle state: administrator, responders and model registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Bootstrap administrator
    pub admin: Address,
    /// Accounts granted the response role
    #[serde(default)]
    pub responders: Vec<Address>,
    /// Registered models
    pub models: Vec<GenesisModel>,
    /// Token balances minted when a local ledger is built
    #[serde(default)]
    pub allocations: Vec<GenesisAllocation>,
}

/// A model and the format pairs it accepts.
///
/// `inputs` × `outputs` expands to every combination; `pairs` lists extra
/// combinations explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisModel {
    pub id: ModelId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<FormatTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<FormatTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<FormatPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub account: Address,
    /// Whole tokens as a decimal string, e.g. "1000" or "0.5"
    pub amount: String,
}

/// Genesis builder
#[derive(Debug, Clone)]
pub struct Genesis {
    config: GenesisConfig,
}

impl GenesisModel {
    pub fn support(&self) -> FormatSupport {
        let crossed = FormatSupport::from_lists(&self.inputs, &self.outputs);
        FormatSupport::new(crossed.pairs().cloned().chain(self.pairs.iter().cloned()))
    }
}

impl Genesis {
    pub fn new(config: GenesisConfig) -> Result<Self> {
        let genesis = Self { config };
        genesis.validate()?;
        Ok(genesis)
    }

    /// Load genesis configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context("Failed to read genesis file")?;

        Self::from_json(&content)
    }

    /// Load genesis configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GenesisConfig = serde_json::from_str(json)
            .context("Failed to parse genesis configuration")?;

        Self::new(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.config)
            .context("Failed to serialize genesis configuration")
    }

    /// Local development preset
    pub fn testnet() -> Self {
        let text = ["plain:text", "ipfs:text", "url:text"];
        let tags = |names: &[&str]| -> Vec<FormatTag> {
            names.iter().filter_map(|n| FormatTag::new(*n).ok()).collect()
        };
        let model = |id: &str, inputs: &[&str], outputs: &[&str]| -> Option<GenesisModel> {
            Some(GenesisModel {
                id: ModelId::new(id).ok()?,
                inputs: tags(inputs),
                outputs: tags(outputs),
                pairs: Vec::new(),
            })
        };

        let admin = Address::from_low_u64_be(0xad);
        Self {
            config: GenesisConfig {
                admin,
                responders: vec![Address::from_low_u64_be(0x5e)],
                models: [
                    model("gpt-3.5", &text, &text),
                    model("gpt-4o", &text, &["plain:text", "ipfs:json"]),
                    model("dall-e", &text, &["ipfs:img", "url:img"]),
                ]
                .into_iter()
                .flatten()
                .collect(),
                allocations: vec![GenesisAllocation {
                    account: Address::from_low_u64_be(0x0c),
                    amount: "1000".to_string(),
                }],
            },
        }
    }

    pub fn config(&self) -> &GenesisConfig {
        &self.config
    }

    pub fn admin(&self) -> Address {
        self.config.admin
    }

    pub fn models(&self) -> Vec<(ModelId, FormatSupport)> {
        self.config
            .models
            .iter()
            .map(|m| (m.id.clone(), m.support()))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.config.admin.is_zero() {
            anyhow::bail!("genesis admin must not be the zero address");
        }

        let mut seen = std::collections::BTreeSet::new();
        for model in &self.config.models {
            if !seen.insert(&model.id) {
                anyhow::bail!("Duplicate model in genesis: {}", model.id);
            }
            if model.inputs.is_empty() != model.outputs.is_empty() {
                anyhow::bail!("Model {} must list both inputs and outputs", model.id);
            }
            if model.support().is_empty() {
                anyhow::bail!("Model {} accepts no format pair", model.id);
            }
        }

        for allocation in &self.config.allocations {
            parse_units(&allocation.amount, DEFAULT_DECIMALS)
                .with_context(|| format!("Invalid allocation for {}", allocation.account))?;
        }

        Ok(())
    }

    /// Build an engine at `address` over `ledger` with the genesis registry and roles.
    pub fn build_engine<L: TokenLedger>(&self, address: Address, ledger: L) -> Result<OracleEngine<L>> {
        let admin = self.config.admin;
        let mut engine = OracleEngine::initialize(address, ledger, admin, self.models());
        for responder in &self.config.responders {
            engine
                .grant_role(admin, Role::Responder, *responder)
                .context("Failed to grant response role")?;
        }

        info!(
            %address,
            %admin,
            models = self.config.models.len(),
            responders = self.config.responders.len(),
            "Genesis state built"
        );
        Ok(engine)
    }

    /// In-process token ledger with the admin holding every role and the
    /// allocations minted.
    pub fn build_token(&self) -> Result<AiToken> {
        let admin = self.config.admin;
        let mut token = AiToken::new(admin, admin, admin);
        for allocation in &self.config.allocations {
            let amount: U256 = parse_units(&allocation.amount, DEFAULT_DECIMALS)
                .with_context(|| format!("Invalid allocation for {}", allocation.account))?;
            token
                .mint(admin, allocation.account, amount)
                .with_context(|| format!("Failed to mint allocation for {}", allocation.account))?;
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aioracle_token::SharedToken;

    fn tag(s: &str) -> FormatTag {
        FormatTag::new(s).unwrap()
    }

    #[test]
    fn test_testnet_genesis() {
        let genesis = Genesis::testnet();
        assert!(genesis.validate().is_ok());

        let engine = genesis
            .build_engine(Address::from_low_u64_be(0xa10a), SharedToken::new(genesis.build_token().unwrap()))
            .unwrap();
        let dalle = ModelId::new("dall-e").unwrap();
        assert!(engine.is_valid_combination(&dalle, &tag("url:text"), &tag("ipfs:img")));
        assert!(!engine.is_valid_combination(&dalle, &tag("plain:text"), &tag("plain:text")));
        assert!(engine.has_role(Role::Responder, &Address::from_low_u64_be(0x5e)));
        assert!(!engine.has_role(Role::Responder, &genesis.admin()));
    }

    #[test]
    fn test_allocations_are_minted() {
        let token = Genesis::testnet().build_token().unwrap();
        assert_eq!(
            token.balance_of(&Address::from_low_u64_be(0x0c)),
            parse_units("1000", 18).unwrap()
        );
    }

    #[test]
    fn test_json_with_pairs_and_lists() {
        let genesis = Genesis::from_json(
            r#"{
                "admin": "0x00000000000000000000000000000000000000ad",
                "models": [
                    { "id": "gpt-3.5", "inputs": ["plain:text"], "outputs": ["plain:text", "ipfs:text"] },
                    { "id": "whisper", "pairs": [ { "input": "ipfs:audio", "output": "plain:text" } ] }
                ]
            }"#,
        )
        .unwrap();

        let models = genesis.models();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].1.len(), 2);
        assert!(models[1].1.contains(&tag("ipfs:audio"), &tag("plain:text")));
        assert!(genesis.config().responders.is_empty());
    }

    #[test]
    fn test_invalid_genesis() {
        let duplicate = r#"{
            "admin": "0x00000000000000000000000000000000000000ad",
            "models": [
                { "id": "m", "pairs": [ { "input": "a:x", "output": "b:y" } ] },
                { "id": "m", "pairs": [ { "input": "a:x", "output": "b:y" } ] }
            ]
        }"#;
        assert!(Genesis::from_json(duplicate).is_err());

        let empty_model = r#"{
            "admin": "0x00000000000000000000000000000000000000ad",
            "models": [ { "id": "m", "inputs": ["a:x"] } ]
        }"#;
        assert!(Genesis::from_json(empty_model).is_err());

        let bad_tag = r#"{
            "admin": "0x00000000000000000000000000000000000000ad",
            "models": [ { "id": "m", "pairs": [ { "input": "a x", "output": "b:y" } ] } ]
        }"#;
        assert!(Genesis::from_json(bad_tag).is_err());
    }

    #[test]
    fn test_json_roundtrip_of_preset() {
        let json = Genesis::testnet().to_json().unwrap();
        let parsed = Genesis::from_json(&json).unwrap();
        assert_eq!(parsed.models().len(), 3);
    }
}
