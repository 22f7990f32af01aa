//! Role Model
//! Mission: Map the fixed set of roles onto the authority strings carried in tokens

use serde::{Deserialize, Serialize};

/// Closed set of role kinds. New kinds are a code change, never a runtime one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleKind {
    #[serde(rename = "ADMIN")]
    Admin, // User administration + everything a User can do
    #[serde(rename = "USER")]
    User, // Own todo lists
}

impl RoleKind {
    pub const ALL: [RoleKind; 2] = [RoleKind::Admin, RoleKind::User];

    /// Authority string embedded in tokens and compared by resource guards.
    pub fn authority(&self) -> &'static str {
        match self {
            RoleKind::Admin => "ADMIN",
            RoleKind::User => "USER",
        }
    }

    /// Exact inverse of [`RoleKind::authority`].
    pub fn from_authority(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(RoleKind::Admin),
            "USER" => Some(RoleKind::User),
            _ => None,
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            RoleKind::Admin => "Administrator",
            RoleKind::User => "Regular user",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.authority())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    Active,
    Inactive,
}

impl RoleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RoleStatus::Active => "active",
            RoleStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(RoleStatus::Active),
            "inactive" => Some(RoleStatus::Inactive),
            _ => None,
        }
    }
}

/// A role as stored for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub kind: RoleKind,
    pub description: String,
    pub status: RoleStatus,
}

impl Role {
    pub fn new(id: i64, kind: RoleKind, status: RoleStatus) -> Self {
        Self {
            id,
            kind,
            description: kind.default_description().to_string(),
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RoleStatus::Active
    }
}

/// Authorities granted by `roles` at issuance time.
///
/// Inactive roles are skipped. The result is sorted and deduplicated so the
/// claim encoding does not depend on the order roles were loaded in.
pub fn active_authorities(roles: &[Role]) -> Vec<String> {
    let mut kinds: Vec<RoleKind> = roles
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.kind)
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds.iter().map(|k| k.authority().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_round_trip_for_every_kind() {
        for kind in RoleKind::ALL {
            assert_eq!(RoleKind::from_authority(kind.authority()), Some(kind));
        }
        assert_eq!(RoleKind::Admin.authority(), "ADMIN");
        assert_eq!(RoleKind::User.authority(), "USER");
    }

    #[test]
    fn test_from_authority_is_exact_match() {
        assert_eq!(RoleKind::from_authority("user"), None);
        assert_eq!(RoleKind::from_authority("ROLE_USER"), None);
        assert_eq!(RoleKind::from_authority(""), None);
    }

    #[test]
    fn test_role_kind_serializes_as_authority() {
        let json = serde_json::to_string(&RoleKind::Admin).unwrap();
        assert_eq!(json, r#""ADMIN""#);

        let user: RoleKind = serde_json::from_str(r#""USER""#).unwrap();
        assert_eq!(user, RoleKind::User);
    }

    #[test]
    fn test_inactive_roles_grant_nothing() {
        let roles = vec![
            Role::new(1, RoleKind::Admin, RoleStatus::Inactive),
            Role::new(2, RoleKind::User, RoleStatus::Active),
        ];
        assert_eq!(active_authorities(&roles), vec!["USER".to_string()]);
    }

    #[test]
    fn test_active_authorities_are_canonical() {
        let a = vec![
            Role::new(2, RoleKind::User, RoleStatus::Active),
            Role::new(1, RoleKind::Admin, RoleStatus::Active),
            Role::new(3, RoleKind::User, RoleStatus::Active),
        ];
        let b = vec![
            Role::new(1, RoleKind::Admin, RoleStatus::Active),
            Role::new(2, RoleKind::User, RoleStatus::Active),
        ];
        assert_eq!(active_authorities(&a), active_authorities(&b));
        assert_eq!(active_authorities(&a), vec!["ADMIN", "USER"]);
    }

    #[test]
    fn test_role_status_string_conversion() {
        assert_eq!(RoleStatus::Active.as_str(), "active");
        assert_eq!(RoleStatus::from_str("INACTIVE"), Some(RoleStatus::Inactive));
        assert_eq!(RoleStatus::from_str("deleted"), None);
    }
}
