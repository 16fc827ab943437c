//! Policy commands.
//!
//! `gatekeep policy check` - Load a YAML policy seed into an in-memory store and
//! evaluate one decision against it.

use anyhow::Context;
use gatekeep_core::{
    ActionType, CredentialStore, NewPermission, NewPrincipal, PolicyStore, PrincipalId,
    ResourceType, StoreConfig,
};
use gatekeep_policy::PolicyEngine;
use gatekeep_store::MemoryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Policy seed file.
///
/// ```yaml
/// roles:
///   - name: clerk
///     description: Front desk
///     permissions:
///       - { resource: ORDER, action: READ }
/// principals:
///   - username: alice
///     email: alice@example.com
///     roles: [clerk]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicySeed {
    #[serde(default)]
    pub roles: Vec<RoleSeed>,
    #[serde(default)]
    pub principals: Vec<PrincipalSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<GrantSeed>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GrantSeed {
    pub resource: ResourceType,
    pub action: ActionType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalSeed {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Outcome of `policy check`.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub principal: String,
    pub principal_id: PrincipalId,
    pub resource: ResourceType,
    pub action: ActionType,
    pub allowed: bool,
    pub roles: Vec<String>,
}

pub fn load_seed(path: &Path) -> anyhow::Result<PolicySeed> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file: {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse policy file: {}", path.display()))
}

/// Write `seed` into `store`, returning the id assigned to each username.
async fn apply_seed(
    store: &MemoryStore,
    seed: &PolicySeed,
) -> anyhow::Result<HashMap<String, PrincipalId>> {
    let mut permissions = HashMap::new();
    let mut role_ids = HashMap::new();

    for role in &seed.roles {
        let created = store
            .create_role(&role.name, &role.description)
            .await
            .with_context(|| format!("Failed to create role '{}'", role.name))?;

        for grant in &role.permissions {
            let key = (grant.resource, grant.action);
            let permission_id = match permissions.get(&key) {
                Some(id) => *id,
                None => {
                    let permission = store
                        .create_permission(NewPermission {
                            name: format!("{}:{}", grant.resource, grant.action).to_lowercase(),
                            description: String::new(),
                            resource: grant.resource,
                            action: grant.action,
                        })
                        .await?;
                    permissions.insert(key, permission.id);
                    permission.id
                }
            };
            store.grant_permission(created.id, permission_id).await?;
        }
        role_ids.insert(role.name.clone(), created.id);
    }

    let mut principals = HashMap::new();
    for principal in &seed.principals {
        let id = store
            .create_principal(NewPrincipal {
                username: principal.username.clone(),
                email: principal.email.clone(),
                phone: None,
                password_digest: String::new(),
            })
            .await
            .with_context(|| format!("Failed to create principal '{}'", principal.username))?;

        for role in &principal.roles {
            let role_id = role_ids.get(role).with_context(|| {
                format!(
                    "Principal '{}' references unknown role '{role}'",
                    principal.username
                )
            })?;
            store.assign_role(id, *role_id).await?;
        }
        principals.insert(principal.username.clone(), id);
    }

    Ok(principals)
}

/// Evaluate whether `username` may perform `action` on `resource` under the seed
/// in `file`.
pub async fn check(
    file: &Path,
    username: &str,
    resource: &str,
    action: &str,
) -> anyhow::Result<Decision> {
    let resource: ResourceType = resource.parse()?;
    let action: ActionType = action.parse()?;
    let seed = load_seed(file)?;

    let store = Arc::new(MemoryStore::new());
    let principals = apply_seed(&store, &seed).await?;
    let principal_id = *principals
        .get(username)
        .with_context(|| format!("Principal '{username}' is not defined in {}", file.display()))?;

    let engine = PolicyEngine::new(store, StoreConfig::default());
    let summary = engine.load_all().await?;
    tracing::debug!(
        roles = summary.roles,
        grants = summary.grants,
        groupings = summary.groupings,
        "policy seed loaded"
    );

    let allowed = engine.enforce(principal_id, resource, action).await?;
    let roles = engine.roles_for(principal_id).await?;
    engine.close().await;

    let decision = Decision {
        principal: username.to_string(),
        principal_id,
        resource,
        action,
        allowed,
        roles,
    };
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(decision)
}
