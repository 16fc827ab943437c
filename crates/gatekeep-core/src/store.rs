//! Contracts for the external collaborators: the Credential Store, the secret
//! hasher and the Policy Store.
//!
//! Implementations are free to use any persistence. Every method returns a
//! [`StoreError`] that separates "the thing is not there" from "the store could not
//! answer", and callers bound every call with [`with_timeout`].

use crate::model::{
    NewPermission, NewPrincipal, Permission, PermissionId, Principal, PrincipalId,
    PrincipalRecord, Role, RoleId,
};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Structured failure returned by store collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store timed out or failed at the I/O level.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Run a store call under a deadline.
///
/// Elapsed deadlines become [`StoreError::Unavailable`]. Nothing is retried here.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Durable record of principals and their credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_principal_by_email(&self, email: &str) -> Result<PrincipalRecord, StoreError>;

    async fn find_principal_by_id(&self, id: PrincipalId) -> Result<PrincipalRecord, StoreError>;

    /// Persist a new principal. Fails with [`StoreError::Conflict`] when the email or
    /// username is taken.
    async fn create_principal(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError>;
}

/// Opaque credential hashing capability.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, StoreError>;

    /// `false` for a mismatch as well as for an unreadable digest.
    fn verify(&self, digest: &str, secret: &str) -> bool;
}

/// Durable record of roles, permissions, grants and groupings.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the name is taken.
    async fn create_role(&self, name: &str, description: &str) -> Result<Role, StoreError>;

    /// Deletes the role together with every grant and grouping that references it.
    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError>;

    async fn get_role_permissions(&self, id: RoleId) -> Result<Vec<Permission>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when `(resource, action)` already exists.
    async fn create_permission(&self, permission: NewPermission)
    -> Result<Permission, StoreError>;

    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError>;

    /// Deletes the permission together with every grant that references it.
    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError>;

    /// Granting twice is not an error.
    async fn grant_permission(&self, role: RoleId, permission: PermissionId)
    -> Result<(), StoreError>;

    async fn revoke_permission(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), StoreError>;

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError>;

    async fn get_principal_roles(&self, principal: PrincipalId) -> Result<Vec<Role>, StoreError>;

    /// Assigning twice is not an error.
    async fn assign_role(&self, principal: PrincipalId, role: RoleId) -> Result<(), StoreError>;

    async fn unassign_role(&self, principal: PrincipalId, role: RoleId)
    -> Result<(), StoreError>;
}
