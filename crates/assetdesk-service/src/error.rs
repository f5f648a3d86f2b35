//! Service error types.

use assetdesk_core::error::{FieldIssue, RegistryError};
use assetdesk_core::models::user::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("import has {rows} rows, limit is {limit}")]
    TooManyRows { rows: usize, limit: usize },

    #[error("import file is {bytes} bytes, limit is {limit}")]
    FileTooLarge { bytes: u64, limit: u64 },

    #[error("role {actor} may not assign {target}")]
    RoleNotAssignable { actor: Role, target: Role },

    #[error("role {actor} may not manage a {target} account")]
    TargetOutranksActor { actor: Role, target: Role },

    #[error("users cannot change their own account this way")]
    SelfManagement,

    #[error("role {actor} is below {required}")]
    RoleTooLow { actor: Role, required: Role },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl From<ServiceError> for RegistryError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::TooManyRows { .. } => {
                RegistryError::invalid(FieldIssue::limit_exceeded("rows", err.to_string()))
            }
            ServiceError::FileTooLarge { .. } => {
                RegistryError::invalid(FieldIssue::limit_exceeded("file", err.to_string()))
            }
            ServiceError::RoleNotAssignable { .. }
            | ServiceError::TargetOutranksActor { .. }
            | ServiceError::SelfManagement
            | ServiceError::RoleTooLow { .. }
            | ServiceError::InvalidCredentials
            | ServiceError::AccountInactive => RegistryError::AuthorizationDenied {
                reason: err.to_string(),
            },
            ServiceError::Hashing(msg) => RegistryError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_become_validation_issues() {
        let err: RegistryError = ServiceError::TooManyRows {
            rows: 6000,
            limit: 5000,
        }
        .into();
        match err {
            RegistryError::Validation { issues } => {
                assert_eq!(issues[0].field, "rows");
                assert_eq!(issues[0].message, "import has 6000 rows, limit is 5000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn role_rules_are_authorization_failures() {
        let err: RegistryError = ServiceError::RoleNotAssignable {
            actor: Role::Admin,
            target: Role::SuperAdmin,
        }
        .into();
        assert!(matches!(err, RegistryError::AuthorizationDenied { ref reason }
            if reason == "role admin may not assign super-admin"));
    }
}
