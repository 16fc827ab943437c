//! The authorization service.

use crate::error::AuthError;
use crate::validation;
use gatekeep_core::{
    ActionType, CredentialStore, NewPermission, NewPrincipal, Permission, PermissionId, PolicyStore,
    PrincipalId, PrincipalRecord, ResourceType, Role, RoleId, SecretHasher, StoreConfig,
    with_timeout,
};
use gatekeep_policy::{LoadSummary, PolicyEngine};
use gatekeep_token::{IssuedToken, TokenManager};
use std::sync::Arc;
use tracing::{debug, info};

/// Authentication and authorization in one place.
///
/// Cheap to share behind an `Arc`; the only mutable state lives in the policy
/// engine and the token manager's revocation set.
pub struct AuthorizationService {
    credentials: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    tokens: Arc<TokenManager>,
    engine: Arc<PolicyEngine>,
    timeouts: StoreConfig,
}

impl AuthorizationService {
    /// Reporting reads go straight to the store `engine` was built over.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        tokens: Arc<TokenManager>,
        engine: Arc<PolicyEngine>,
        timeouts: StoreConfig,
    ) -> Self {
        Self {
            credentials,
            hasher,
            tokens,
            engine,
            timeouts,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Build the policy index. Must succeed once before permission checks answer.
    pub async fn load_policies(&self) -> Result<LoadSummary, AuthError> {
        Ok(self.engine.load_all().await?)
    }

    /// Stop answering permission checks.
    pub async fn shutdown(&self) {
        self.engine.close().await;
    }

    // ---------------------------------------------------------------------
    // Authentication
    // ---------------------------------------------------------------------

    /// Create a principal and issue its first token.
    ///
    /// Nothing is issued unless the principal was persisted.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<IssuedToken, AuthError> {
        validation::username(username)?;
        validation::password(password)?;
        validation::email(email)?;
        validation::phone(phone)?;

        let digest = self.hash_secret(password).await?;
        let principal = NewPrincipal {
            username: username.trim().to_string(),
            email: email.to_string(),
            phone: phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
            password_digest: digest,
        };

        let id = with_timeout(
            self.timeouts.write_timeout(),
            "create_principal",
            self.credentials.create_principal(principal),
        )
        .await
        .map_err(|e| AuthError::from(e).context("failed to create user"))?;

        let issued = self.tokens.issue(id)?;
        info!(principal = %id, "principal registered");
        Ok(issued)
    }

    /// Exchange email and password for a token.
    ///
    /// An unknown email and a wrong password give different messages; both are
    /// [`ErrorKind::Unauthenticated`](crate::ErrorKind::Unauthenticated).
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        validation::email(email)?;
        validation::password(password)?;

        let record = with_timeout(
            self.timeouts.read_timeout(),
            "find_principal_by_email",
            self.credentials.find_principal_by_email(email),
        )
        .await
        .map_err(|e| {
            if e.is_not_found() {
                AuthError::unauthenticated("user does not exist")
            } else {
                AuthError::from(e).context("failed to get user")
            }
        })?;

        if !self.verify_secret(&record, password).await? {
            info!(principal = %record.id, "login rejected");
            return Err(AuthError::unauthenticated("incorrect password"));
        }

        let issued = self.tokens.issue(record.id)?;
        info!(principal = %record.id, "login succeeded");
        Ok(issued)
    }

    /// Revoke a token.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.tokens.revoke(token)?;
        info!(principal = %claims.principal_id, "token revoked");
        Ok(())
    }

    /// The principal a token was issued to, if the token is still honoured.
    pub fn validate_token(&self, token: &str) -> Result<PrincipalId, AuthError> {
        let principal = self.tokens.verify(token)?;
        debug!(%principal, "token validated");
        Ok(principal)
    }

    /// A new token for the same principal; the presented one keeps its own expiry.
    pub fn refresh_token(&self, token: &str) -> Result<IssuedToken, AuthError> {
        let issued = self.tokens.refresh(token)?;
        info!(principal = %issued.principal_id(), "token refreshed");
        Ok(issued)
    }

    // ---------------------------------------------------------------------
    // Authorization
    // ---------------------------------------------------------------------

    /// May an existing principal perform `action` on `resource`?
    pub async fn check_permission(
        &self,
        principal: PrincipalId,
        resource: ResourceType,
        action: ActionType,
    ) -> Result<bool, AuthError> {
        with_timeout(
            self.timeouts.read_timeout(),
            "find_principal_by_id",
            self.credentials.find_principal_by_id(principal),
        )
        .await?;

        Ok(self.engine.enforce(principal, resource, action).await?)
    }

    /// Verify a bearer token, then require `action` on `resource`.
    ///
    /// Token failures are `Unauthenticated` (or `Invalid` for garbage); a policy
    /// denial is `Forbidden`.
    pub async fn authorize(
        &self,
        token: &str,
        resource: ResourceType,
        action: ActionType,
    ) -> Result<PrincipalId, AuthError> {
        let principal = self.tokens.verify(token)?;
        if !self.engine.enforce(principal, resource, action).await? {
            return Err(AuthError::forbidden(format!(
                "principal {principal} may not {action} {resource}"
            )));
        }
        Ok(principal)
    }

    // ---------------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------------

    pub async fn create_role(&self, name: &str, description: &str) -> Result<Role, AuthError> {
        validation::role_name(name)?;
        let role = self.engine.create_role(name, description).await?;
        info!(role = %role.name, id = %role.id, "role created");
        Ok(role)
    }

    /// Delete a role; every grant and assignment referencing it goes with it.
    pub async fn delete_role(&self, role: RoleId) -> Result<(), AuthError> {
        let role = self.engine.delete_role(role).await?;
        info!(role = %role.name, id = %role.id, "role deleted");
        Ok(())
    }

    pub async fn assign_role_to_user(
        &self,
        principal: PrincipalId,
        role: RoleId,
    ) -> Result<(), AuthError> {
        let role = self.engine.assign_role(principal, role).await?;
        info!(%principal, role = %role.name, "role assigned");
        Ok(())
    }

    pub async fn remove_role_from_user(
        &self,
        principal: PrincipalId,
        role: RoleId,
    ) -> Result<(), AuthError> {
        let role = self.engine.unassign_role(principal, role).await?;
        info!(%principal, role = %role.name, "role removed");
        Ok(())
    }

    pub async fn create_permission(
        &self,
        name: &str,
        description: &str,
        resource: ResourceType,
        action: ActionType,
    ) -> Result<Permission, AuthError> {
        validation::permission_name(name)?;
        let permission = self
            .engine
            .create_permission(NewPermission {
                name: name.trim().to_string(),
                description: description.to_string(),
                resource,
                action,
            })
            .await?;
        info!(
            permission = %permission.name,
            id = %permission.id,
            %resource,
            %action,
            "permission created"
        );
        Ok(permission)
    }

    /// Delete a permission; every role loses it.
    pub async fn delete_permission(&self, permission: PermissionId) -> Result<(), AuthError> {
        let permission = self.engine.delete_permission(permission).await?;
        info!(permission = %permission.name, id = %permission.id, "permission deleted");
        Ok(())
    }

    pub async fn assign_permission_to_role(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), AuthError> {
        let (role, permission) = self.engine.grant_permission(role, permission).await?;
        info!(role = %role.name, permission = %permission.name, "permission granted");
        Ok(())
    }

    pub async fn remove_permission_from_role(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), AuthError> {
        let (role, permission) = self.engine.revoke_permission(role, permission).await?;
        info!(role = %role.name, permission = %permission.name, "permission revoked");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Reporting
    // ---------------------------------------------------------------------

    pub async fn get_user_roles(&self, principal: PrincipalId) -> Result<Vec<Role>, AuthError> {
        Ok(with_timeout(
            self.timeouts.read_timeout(),
            "get_principal_roles",
            self.engine.store().get_principal_roles(principal),
        )
        .await?)
    }

    pub async fn get_role_permissions(&self, role: RoleId) -> Result<Vec<Permission>, AuthError> {
        Ok(with_timeout(
            self.timeouts.read_timeout(),
            "get_role_permissions",
            self.engine.store().get_role_permissions(role),
        )
        .await?)
    }

    async fn hash_secret(&self, secret: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::from(e).context("failed to hash password"))
    }

    async fn verify_secret(&self, record: &PrincipalRecord, secret: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let digest = record.password_digest.clone();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &secret))
            .await
            .map_err(|e| AuthError::internal(format!("verify task failed: {e}")))
    }
}
