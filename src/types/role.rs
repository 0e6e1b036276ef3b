use std::fmt;

use serde::{Deserialize, Serialize};

/// The role assigned to a user at creation time. Roles never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    StoreOwner,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::StoreOwner];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::StoreOwner => "store_owner",
        }
    }

    /// Converts a role string to its variant.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "store_owner" => Some(Role::StoreOwner),
            _ => None,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Role::Admin => 1 << 0,
            Role::User => 1 << 1,
            Role::StoreOwner => 1 << 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RoleSet is a bitmask of roles allowed through a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const ADMIN: RoleSet = RoleSet(Role::Admin.bit());
    pub const USER: RoleSet = RoleSet(Role::User.bit());
    pub const STORE_OWNER: RoleSet = RoleSet(Role::StoreOwner.bit());
    /// Roles that may create and manage stores.
    pub const STORE_MANAGERS: RoleSet = RoleSet(Role::Admin.bit() | Role::StoreOwner.bit());
    pub const ANY: RoleSet =
        RoleSet(Role::Admin.bit() | Role::User.bit() | Role::StoreOwner.bit());

    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    #[must_use]
    pub const fn union(self, other: RoleSet) -> RoleSet {
        RoleSet(self.0 | other.0)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        Role::ALL
            .into_iter()
            .filter(|r| self.contains(*r))
            .map(Role::as_str)
            .collect()
    }
}

impl From<Role> for RoleSet {
    fn from(role: Role) -> Self {
        RoleSet(role.bit())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

/// The authenticated user making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Returns true if the actor may mutate a row owned by `owner_id`.
    /// Admins may mutate anything; everyone else only their own rows.
    #[must_use]
    pub const fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_set_contains() {
        assert!(RoleSet::STORE_MANAGERS.contains(Role::Admin));
        assert!(RoleSet::STORE_MANAGERS.contains(Role::StoreOwner));
        assert!(!RoleSet::STORE_MANAGERS.contains(Role::User));
        assert!(!RoleSet::ADMIN.contains(Role::StoreOwner));
        assert!(RoleSet::default().to_strings().is_empty());
    }

    #[test]
    fn test_role_set_union() {
        let set = RoleSet::ADMIN.union(RoleSet::USER);
        assert!(set.contains(Role::User));
        assert!(!set.contains(Role::StoreOwner));
        assert_eq!(set.union(RoleSet::STORE_OWNER), RoleSet::ANY);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(Role::parse("store_owner"), Some(Role::StoreOwner));
        assert_eq!(Role::parse("Admin"), None);
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::StoreOwner).unwrap();
        assert_eq!(json, "\"store_owner\"");
    }

    #[test]
    fn test_actor_can_manage() {
        let owner = Actor {
            id: 7,
            role: Role::StoreOwner,
        };
        assert!(owner.can_manage(7));
        assert!(!owner.can_manage(8));

        let admin = Actor {
            id: 1,
            role: Role::Admin,
        };
        assert!(admin.can_manage(8));
    }
}
