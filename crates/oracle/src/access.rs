use crate::error::{OracleError, OracleResult};
use aioracle_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Capabilities gating oracle operations. Holding one never implies the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Registry management and role grants
    Admin,
    /// May deliver AI response segments
    Responder,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::Responder];

    /// Byte tag used in storage keys.
    pub fn as_byte(&self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::Responder => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN_ROLE"),
            Role::Responder => f.write_str("RESPONSE_ROLE"),
        }
    }
}

/// Role membership table.
///
/// Pure data: callers decide who may change it (see the engine's admin gate).
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// Bootstrap with a single administrator.
    pub fn new(admin: Address) -> Self {
        let mut access = Self::default();
        access.grant(Role::Admin, admin);
        access
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members.get(&role).map_or(false, |set| set.contains(account))
    }

    pub fn require_role(&self, role: Role, account: &Address) -> OracleResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(OracleError::Unauthorized { account: *account, role })
        }
    }

    /// Returns false when the account already held the role.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    /// Returns false when the account did not hold the role.
    pub fn revoke(&mut self, role: Role, account: &Address) -> bool {
        self.members.get_mut(&role).map_or(false, |set| set.remove(account))
    }

    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All (role, account) memberships, for persistence.
    pub fn entries(&self) -> impl Iterator<Item = (Role, Address)> + '_ {
        self.members
            .iter()
            .flat_map(|(role, set)| set.iter().map(move |account| (*role, *account)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_admin_only() {
        let admin = Address::from_low_u64_be(1);
        let access = AccessControl::new(admin);

        assert!(access.has_role(Role::Admin, &admin));
        assert!(!access.has_role(Role::Responder, &admin));
        assert!(matches!(
            access.require_role(Role::Responder, &admin),
            Err(OracleError::Unauthorized { role: Role::Responder, .. })
        ));
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut access = AccessControl::default();
        let node = Address::from_low_u64_be(5);

        assert!(access.grant(Role::Responder, node));
        assert!(!access.grant(Role::Responder, node));
        assert_eq!(access.members(Role::Responder), vec![node]);

        assert!(access.revoke(Role::Responder, &node));
        assert!(!access.revoke(Role::Responder, &node));
        assert!(access.members(Role::Responder).is_empty());
        assert_eq!(access.entries().count(), 0);
    }
}
