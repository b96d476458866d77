use crate::error::{OracleError, OracleResult};
use aioracle_types::{FormatPair, FormatTag, ModelId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The (input, output) combinations one model accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSupport {
    pairs: BTreeSet<FormatPair>,
}

impl FormatSupport {
    pub fn new(pairs: impl IntoIterator<Item = FormatPair>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Every input paired with every output.
    pub fn from_lists(inputs: &[FormatTag], outputs: &[FormatTag]) -> Self {
        Self::new(inputs.iter().flat_map(|input| {
            outputs
                .iter()
                .map(move |output| FormatPair::new(input.clone(), output.clone()))
        }))
    }

    pub fn contains(&self, input: &FormatTag, output: &FormatTag) -> bool {
        self.pairs.contains(&FormatPair::new(input.clone(), output.clone()))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &FormatPair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Model id to accepted format pairs.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, FormatSupport>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the pair set of `model`; returns the previous set.
    pub fn register(&mut self, model: ModelId, support: FormatSupport) -> Option<FormatSupport> {
        self.models.insert(model, support)
    }

    pub fn remove(&mut self, model: &ModelId) -> Option<FormatSupport> {
        self.models.remove(model)
    }

    pub fn is_valid_combination(&self, model: &ModelId, input: &FormatTag, output: &FormatTag) -> bool {
        self.check(model, input, output).is_ok()
    }

    /// Explain why a combination is rejected.
    pub fn check(&self, model: &ModelId, input: &FormatTag, output: &FormatTag) -> OracleResult<()> {
        let support = self
            .models
            .get(model)
            .ok_or_else(|| OracleError::UnknownModel(model.clone()))?;

        if support.contains(input, output) {
            Ok(())
        } else {
            Err(OracleError::UnsupportedFormatPair {
                model: model.clone(),
                pair: FormatPair::new(input.clone(), output.clone()),
            })
        }
    }

    pub fn formats_of(&self, model: &ModelId) -> Option<&FormatSupport> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = (&ModelId, &FormatSupport)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> FormatTag {
        FormatTag::new(s).unwrap()
    }

    fn model(s: &str) -> ModelId {
        ModelId::new(s).unwrap()
    }

    #[test]
    fn test_from_lists_is_cross_product() {
        let support = FormatSupport::from_lists(
            &[tag("plain:text"), tag("ipfs:json")],
            &[tag("plain:text"), tag("ipfs:img")],
        );
        assert_eq!(support.len(), 4);
        assert!(support.contains(&tag("ipfs:json"), &tag("ipfs:img")));
        assert!(!support.contains(&tag("ipfs:img"), &tag("ipfs:json")));
    }

    #[test]
    fn test_unknown_model_and_unsupported_pair() {
        let mut registry = ModelRegistry::new();
        registry.register(
            model("dall-e"),
            FormatSupport::new([FormatPair::parse("plain:text", "ipfs:img").unwrap()]),
        );

        assert!(registry.is_valid_combination(&model("dall-e"), &tag("plain:text"), &tag("ipfs:img")));
        assert!(matches!(
            registry.check(&model("gpt-4o"), &tag("plain:text"), &tag("ipfs:img")),
            Err(OracleError::UnknownModel(_))
        ));
        assert!(matches!(
            registry.check(&model("dall-e"), &tag("plain:text"), &tag("plain:text")),
            Err(OracleError::UnsupportedFormatPair { .. })
        ));
    }

    #[test]
    fn test_register_replaces_pairs() {
        let mut registry = ModelRegistry::new();
        let id = model("gpt-3.5");
        registry.register(id.clone(), FormatSupport::new([FormatPair::parse("a:x", "b:y").unwrap()]));
        let previous = registry.register(id.clone(), FormatSupport::new([FormatPair::parse("c:x", "d:y").unwrap()]));

        assert_eq!(previous.map(|s| s.len()), Some(1));
        assert!(!registry.is_valid_combination(&id, &tag("a:x"), &tag("b:y")));
        assert!(registry.is_valid_combination(&id, &tag("c:x"), &tag("d:y")));

        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
    }
}
