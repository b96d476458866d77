use crate::access::{AccessControl, Role};
use crate::escrow::{EscrowAccount, EscrowStore};
use crate::registry::{FormatSupport, ModelRegistry};
use crate::request::{Request, RequestStore};
use aioracle_storage::{keys, Database, KeyPrefix, StorageError, TypedDatabase};
use aioracle_types::{Address, ModelId, RequestId, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Layout version of the persisted records.
pub const STATE_VERSION: u32 = 1;

const VERSION_KEY: &str = "version";
const META_KEY: &str = "meta";

const RECORD_PREFIXES: [KeyPrefix; 4] = [KeyPrefix::Escrow, KeyPrefix::Model, KeyPrefix::Request, KeyPrefix::Role];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateMeta {
    next_request_id: RequestId,
    accrued_fees: U256,
}

/// Everything the engine owns apart from its collaborators.
#[derive(Debug, Clone)]
pub struct OracleState {
    pub escrow: EscrowStore,
    pub registry: ModelRegistry,
    pub requests: RequestStore,
    pub access: AccessControl,
    pub accrued_fees: U256,
}

impl OracleState {
    pub fn new(admin: Address) -> Self {
        Self {
            escrow: EscrowStore::new(),
            registry: ModelRegistry::new(),
            requests: RequestStore::new(),
            access: AccessControl::new(admin),
            accrued_fees: U256::zero(),
        }
    }

    /// Write the whole state in one batch.
    ///
    /// The batch replaces every stored record, so nothing from a previously
    /// saved state survives unless `self` still holds it.
    pub fn save(&self, db: &dyn Database) -> aioracle_storage::Result<()> {
        let mut batch = db.batch();

        for prefix in RECORD_PREFIXES {
            let mut iter = db.iter_prefix(&[prefix.as_byte()]);
            while let Some(entry) = iter.next() {
                let (key, _) = entry?;
                batch.delete(&key);
            }
        }

        batch.put(&keys::meta_key(VERSION_KEY), &aioracle_storage::encode(&STATE_VERSION)?);
        let meta = StateMeta {
            next_request_id: self.requests.next_id(),
            accrued_fees: self.accrued_fees,
        };
        batch.put(&keys::meta_key(META_KEY), &aioracle_storage::encode(&meta)?);

        for (owner, account) in self.escrow.accounts() {
            batch.put(&keys::escrow_key(owner), &aioracle_storage::encode(&(*owner, *account))?);
        }
        for (model, support) in self.registry.models() {
            batch.put(&keys::model_key(model), &aioracle_storage::encode(&(model, support))?);
        }
        for request in self.requests.iter() {
            batch.put(&keys::request_key(request.id), &aioracle_storage::encode(request)?);
        }
        for (role, account) in self.access.entries() {
            batch.put(&keys::role_key(role.as_byte(), &account), &aioracle_storage::encode(&(role, account))?);
        }

        let ops = batch.len();
        db.write_batch(batch)?;
        debug!(ops, requests = self.requests.len(), "Persisted oracle state");
        Ok(())
    }

    /// Read a state written by [`OracleState::save`]; `None` on an empty store.
    pub fn load(db: &dyn Database) -> aioracle_storage::Result<Option<Self>> {
        let version: u32 = match db.get_typed(&keys::meta_key(VERSION_KEY))? {
            Some(version) => version,
            None => return Ok(None),
        };
        if version != STATE_VERSION {
            return Err(StorageError::VersionMismatch {
                stored: version,
                expected: STATE_VERSION,
            });
        }

        let meta: StateMeta = db
            .get_typed(&keys::meta_key(META_KEY))?
            .ok_or_else(|| StorageError::InvalidData("missing state meta record".to_string()))?;

        let mut escrow = EscrowStore::new();
        for (_, (owner, account)) in db.collect_prefix::<(Address, EscrowAccount)>(&[KeyPrefix::Escrow.as_byte()])? {
            escrow.restore(owner, account);
        }

        let mut registry = ModelRegistry::new();
        for (_, (model, support)) in db.collect_prefix::<(ModelId, FormatSupport)>(&[KeyPrefix::Model.as_byte()])? {
            registry.register(model, support);
        }

        let requests: Vec<Request> = db
            .collect_prefix::<Request>(&[KeyPrefix::Request.as_byte()])?
            .into_iter()
            .map(|(_, request)| request)
            .collect();
        if let Some(last) = requests.last() {
            if last.id >= meta.next_request_id {
                return Err(StorageError::InvalidData(format!(
                    "request {} at or beyond next id {}",
                    last.id, meta.next_request_id
                )));
            }
        }

        let mut access = AccessControl::default();
        for (_, (role, account)) in db.collect_prefix::<(Role, Address)>(&[KeyPrefix::Role.as_byte()])? {
            access.grant(role, account);
        }

        debug!(requests = requests.len(), models = registry.len(), "Loaded oracle state");

        Ok(Some(Self {
            escrow,
            registry,
            requests: RequestStore::restore(requests, meta.next_request_id),
            access,
            accrued_fees: meta.accrued_fees,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestParams;
    use aioracle_storage::MemoryDatabase;
    use aioracle_types::{Bytes, FormatPair, FormatTag};

    fn sample_state() -> OracleState {
        let admin = Address::from_low_u64_be(1);
        let user = Address::from_low_u64_be(2);
        let mut state = OracleState::new(admin);
        state.access.grant(Role::Responder, Address::from_low_u64_be(3));
        state.registry.register(
            ModelId::new("gpt-4o").unwrap(),
            FormatSupport::new([FormatPair::parse("plain:text", "plain:text").unwrap()]),
        );
        state.escrow.credit(user, U256::from(500)).unwrap();
        state.escrow.reserve(user, U256::from(100)).unwrap();
        state
            .requests
            .insert(
                user,
                RequestParams {
                    data: Bytes::from("prompt"),
                    model: ModelId::new("gpt-4o").unwrap(),
                    input_format: FormatTag::new("plain:text").unwrap(),
                    output_format: FormatTag::new("plain:text").unwrap(),
                    callback_address: Address::ZERO,
                    callback_gas_limit: 0,
                    token_limit: U256::from(100),
                },
            )
            .unwrap();
        state.accrued_fees = U256::from(7);
        state
    }

    #[test]
    fn test_empty_store_loads_none() {
        let db = MemoryDatabase::new();
        assert!(OracleState::load(&db).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let db = MemoryDatabase::new();
        let state = sample_state();
        state.save(&db).unwrap();

        let loaded = OracleState::load(&db).unwrap().unwrap();
        let user = Address::from_low_u64_be(2);
        assert_eq!(loaded.escrow.account(&user), state.escrow.account(&user));
        assert_eq!(loaded.requests.next_id(), RequestId::new(2));
        assert_eq!(loaded.requests.get(RequestId::FIRST).unwrap(), state.requests.get(RequestId::FIRST).unwrap());
        assert!(loaded.access.has_role(Role::Responder, &Address::from_low_u64_be(3)));
        assert_eq!(loaded.registry.len(), 1);
        assert_eq!(loaded.accrued_fees, U256::from(7));
    }

    #[test]
    fn test_removed_records_are_deleted() {
        let db = MemoryDatabase::new();
        let mut state = sample_state();
        state.save(&db).unwrap();

        state.registry.remove(&ModelId::new("gpt-4o").unwrap());
        state.access.revoke(Role::Responder, &Address::from_low_u64_be(3));
        state.save(&db).unwrap();

        let loaded = OracleState::load(&db).unwrap().unwrap();
        assert!(loaded.registry.is_empty());
        assert!(loaded.access.members(Role::Responder).is_empty());
    }

    #[test]
    fn test_fresh_state_replaces_previous_one() {
        let db = MemoryDatabase::new();
        sample_state().save(&db).unwrap();

        let admin = Address::from_low_u64_be(1);
        OracleState::new(admin).save(&db).unwrap();

        let loaded = OracleState::load(&db).unwrap().unwrap();
        assert!(loaded.requests.is_empty());
        assert_eq!(loaded.requests.next_id(), RequestId::FIRST);
        assert_eq!(loaded.escrow.account(&Address::from_low_u64_be(2)), EscrowAccount::default());
        assert!(loaded.registry.is_empty());
        assert_eq!(loaded.access.members(Role::Admin), vec![admin]);
        assert!(loaded.access.members(Role::Responder).is_empty());
        assert_eq!(loaded.accrued_fees, U256::zero());
    }

    #[test]
    fn test_version_mismatch() {
        let db = MemoryDatabase::new();
        sample_state().save(&db).unwrap();
        db.put_typed(&keys::meta_key(VERSION_KEY), &(STATE_VERSION + 1)).unwrap();

        assert!(matches!(
            OracleState::load(&db),
            Err(StorageError::VersionMismatch { stored: 2, expected: 1 })
        ));
    }
}
