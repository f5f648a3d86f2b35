//! User domain model and the role hierarchy.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, totally ordered by privilege.
///
/// `Technician < ItManager < Admin < SuperAdmin`. Externally supplied role
/// strings go through [`Role::normalize`] once at the boundary so that the
/// rest of the code only ever sees these four values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Role {
    Technician,
    ItManager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Technician,
        Role::ItManager,
        Role::Admin,
        Role::SuperAdmin,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Role::Technician => 1,
            Role::ItManager => 2,
            Role::Admin => 3,
            Role::SuperAdmin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Technician => "technician",
            Role::ItManager => "it-manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }

    /// Map canonical and legacy role names onto a [`Role`].
    ///
    /// Accepts any case and `_`/`-`/space separators. Legacy names from
    /// older deployments (`employee`, `manager`, `administrator`, `owner`,
    /// ...) map onto their current equivalents.
    pub fn normalize(raw: &str) -> Option<Role> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match key.as_str() {
            "technician" | "tech" | "employee" | "user" | "staff" => Some(Role::Technician),
            "it-manager" | "itmanager" | "manager" | "it-admin" => Some(Role::ItManager),
            "admin" | "administrator" => Some(Role::Admin),
            "super-admin" | "superadmin" | "owner" | "root" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Roles this role may hand out to other users.
    pub fn assignable_roles(self) -> &'static [Role] {
        match self {
            Role::SuperAdmin => &[Role::Admin, Role::ItManager, Role::Technician],
            Role::Admin => &[Role::ItManager, Role::Technician],
            Role::ItManager | Role::Technician => &[],
        }
    }

    pub fn can_assign(self, target: Role) -> bool {
        self.assignable_roles().contains(&target)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::normalize(s).ok_or_else(|| format!("unknown role: {s}"))
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Trimmed, lowercased; unique within the tenant.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Per-tenant sequential number assigned by the store.
    pub employee_id: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Already-hashed password (see the service crate's password module).
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Canonical form of an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(Role::Technician < Role::ItManager);
        assert!(Role::ItManager < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        for pair in Role::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn legacy_names_normalize() {
        assert_eq!(Role::normalize("Super_Admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::normalize(" IT Manager "), Some(Role::ItManager));
        assert_eq!(Role::normalize("administrator"), Some(Role::Admin));
        assert_eq!(Role::normalize("employee"), Some(Role::Technician));
        assert_eq!(Role::normalize("janitor"), None);
        for role in Role::ALL {
            assert_eq!(Role::normalize(role.as_str()), Some(role));
        }
    }

    #[test]
    fn deserializing_accepts_legacy_names() {
        let role: Role = serde_json::from_str("\"administrator\"").unwrap();
        assert_eq!(role, Role::Admin);
        let role: Role = serde_json::from_str("\"IT_Manager\"").unwrap();
        assert_eq!(role, Role::ItManager);
        assert!(serde_json::from_str::<Role>("\"janitor\"").is_err());

        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(serde_json::from_str::<Role>(&json).unwrap(), role);
        }
    }

    #[test]
    fn admin_cannot_grant_super_admin() {
        assert!(!Role::Admin.can_assign(Role::SuperAdmin));
        assert!(!Role::Admin.can_assign(Role::Admin));
        assert!(Role::Admin.can_assign(Role::ItManager));
        assert!(Role::Admin.can_assign(Role::Technician));
    }

    #[test]
    fn super_admin_grants_everything_but_itself() {
        assert!(Role::SuperAdmin.can_assign(Role::Admin));
        assert!(!Role::SuperAdmin.can_assign(Role::SuperAdmin));
    }

    #[test]
    fn lower_roles_grant_nothing() {
        for target in Role::ALL {
            assert!(!Role::Technician.can_assign(target));
            assert!(!Role::ItManager.can_assign(target));
        }
    }

    #[test]
    fn email_is_case_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
