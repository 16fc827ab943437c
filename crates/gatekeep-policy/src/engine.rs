//! The policy engine: a [`PolicyIndex`] kept in step with a [`PolicyStore`].
//!
//! Every administrative mutation writes the store first and mirrors into the index
//! only once the durable write has succeeded. When a write fails with
//! [`StoreError::Unavailable`] (a timeout included) its durable outcome is unknown,
//! so the index is marked [`EngineState::Stale`] and the next read rebuilds it
//! before answering. A mutation whose future is dropped after the write started
//! has the same unknown outcome and leaves the index stale too.
//!
//! Mutations and rebuilds are serialized by one async mutex, so a rebuild can never
//! swallow a concurrent mutation. Reads go through a fair `tokio` reader/writer lock
//! and run concurrently with each other.

use crate::error::{LoadErrors, LoadFailure, PolicyError};
use crate::index::PolicyIndex;
use gatekeep_core::{
    ActionType, NewPermission, Permission, PermissionId, PolicyStore, PrincipalId, ResourceType,
    Role, RoleId, StoreConfig, StoreError, with_timeout,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle of a [`PolicyEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed; no load has completed yet.
    NotLoaded,
    /// Serving decisions.
    Ready,
    /// A store write had an unknown outcome; the next read rebuilds first.
    Stale,
    /// Shut down; every call fails.
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotLoaded => "not loaded",
            Self::Ready => "ready",
            Self::Stale => "stale",
            Self::Closed => "closed",
        })
    }
}

/// Counts from a completed rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub roles: usize,
    pub principals: usize,
    pub grants: usize,
    pub groupings: usize,
}

struct Shared {
    index: PolicyIndex,
    state: EngineState,
}

/// Role-based policy engine backed by a [`PolicyStore`].
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    timeouts: StoreConfig,
    shared: RwLock<Shared>,
    writer: Mutex<()>,
    /// Set when a mutation was cancelled between its store write and its index update.
    in_doubt: AtomicBool,
}

/// Flags the index as in doubt unless disarmed once the write has been mirrored.
struct PendingWrite<'a> {
    in_doubt: &'a AtomicBool,
    operation: &'a str,
    armed: bool,
}

impl<'a> PendingWrite<'a> {
    fn arm(in_doubt: &'a AtomicBool, operation: &'a str) -> Self {
        Self {
            in_doubt,
            operation,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.in_doubt.store(true, Ordering::Release);
            warn!(
                operation = self.operation,
                "policy mutation cancelled before the index was updated; index marked stale"
            );
        }
    }
}

impl PolicyEngine {
    /// Create an engine. It answers nothing until [`load_all`](Self::load_all) succeeds.
    pub fn new(store: Arc<dyn PolicyStore>, timeouts: StoreConfig) -> Self {
        Self {
            store,
            timeouts,
            shared: RwLock::new(Shared {
                index: PolicyIndex::new(),
                state: EngineState::NotLoaded,
            }),
            writer: Mutex::new(()),
            in_doubt: AtomicBool::new(false),
        }
    }

    /// The store this engine mirrors.
    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    pub async fn state(&self) -> EngineState {
        let state = self.shared.read().await.state;
        if state == EngineState::Ready && self.in_doubt.load(Ordering::Acquire) {
            EngineState::Stale
        } else {
            state
        }
    }

    /// Rebuild the index from the store and swap it in.
    ///
    /// A failure to list roles or principals aborts and leaves the current index
    /// untouched. Failures for individual roles or principals do not abort: the
    /// rest of the index is installed, the engine becomes ready, and all failures
    /// are returned together as [`PolicyError::Load`].
    pub async fn load_all(&self) -> Result<LoadSummary, PolicyError> {
        let _writer = self.writer.lock().await;
        self.rebuild().await
    }

    /// Stop serving. Subsequent calls fail with [`PolicyError::NotReady`].
    pub async fn close(&self) {
        let _writer = self.writer.lock().await;
        let mut shared = self.shared.write().await;
        shared.state = EngineState::Closed;
        shared.index = PolicyIndex::new();
        info!("policy engine closed");
    }

    /// May `principal` perform `action` on `resource`?
    pub async fn enforce(
        &self,
        principal: PrincipalId,
        resource: ResourceType,
        action: ActionType,
    ) -> Result<bool, PolicyError> {
        let allowed = self
            .read_index(|index| index.enforce(principal, resource, action))
            .await?;
        debug!(%principal, %resource, %action, allowed, "policy decision");
        Ok(allowed)
    }

    /// Names of the roles grouped to `principal`, sorted.
    pub async fn roles_for(&self, principal: PrincipalId) -> Result<Vec<String>, PolicyError> {
        self.read_index(|index| index.roles_for(principal)).await
    }

    /// A copy of the current index.
    pub async fn snapshot(&self) -> Result<PolicyIndex, PolicyError> {
        self.read_index(PolicyIndex::clone).await
    }

    pub async fn create_role(&self, name: &str, description: &str) -> Result<Role, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        self.write_through("create_role", self.store.create_role(name, description), |_, _| {})
            .await
    }

    /// Delete a role, its grants and its groupings.
    pub async fn delete_role(&self, role: RoleId) -> Result<Role, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let role = self.read("get_role", self.store.get_role(role)).await?;
        self.write_through("delete_role", self.store.delete_role(role.id), |index, _| {
            index.delete_role(&role.name);
        })
        .await?;
        Ok(role)
    }

    pub async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> Result<Permission, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        self.write_through(
            "create_permission",
            self.store.create_permission(permission),
            |_, _| {},
        )
        .await
    }

    /// Delete a permission and remove its `(resource, action)` from every role.
    pub async fn delete_permission(&self, id: PermissionId) -> Result<Permission, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let permission = self.read("get_permission", self.store.get_permission(id)).await?;
        self.write_through(
            "delete_permission",
            self.store.delete_permission(id),
            |index, _| {
                index.remove_permission(permission.resource, permission.action);
            },
        )
        .await?;
        Ok(permission)
    }

    pub async fn grant_permission(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(Role, Permission), PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let role = self.read("get_role", self.store.get_role(role)).await?;
        let permission = self
            .read("get_permission", self.store.get_permission(permission))
            .await?;
        self.write_through(
            "grant_permission",
            self.store.grant_permission(role.id, permission.id),
            |index, _| {
                index.add_grant(&role.name, permission.resource, permission.action);
            },
        )
        .await?;
        Ok((role, permission))
    }

    pub async fn revoke_permission(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(Role, Permission), PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let role = self.read("get_role", self.store.get_role(role)).await?;
        let permission = self
            .read("get_permission", self.store.get_permission(permission))
            .await?;
        self.write_through(
            "revoke_permission",
            self.store.revoke_permission(role.id, permission.id),
            |index, _| {
                index.remove_grant(&role.name, permission.resource, permission.action);
            },
        )
        .await?;
        Ok((role, permission))
    }

    pub async fn assign_role(&self, principal: PrincipalId, role: RoleId) -> Result<Role, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let role = self.read("get_role", self.store.get_role(role)).await?;
        self.write_through(
            "assign_role",
            self.store.assign_role(principal, role.id),
            |index, _| {
                index.add_grouping(principal, &role.name);
            },
        )
        .await?;
        Ok(role)
    }

    pub async fn unassign_role(
        &self,
        principal: PrincipalId,
        role: RoleId,
    ) -> Result<Role, PolicyError> {
        let _writer = self.writer.lock().await;
        self.ensure_open().await?;
        let role = self.read("get_role", self.store.get_role(role)).await?;
        self.write_through(
            "unassign_role",
            self.store.unassign_role(principal, role.id),
            |index, _| {
                index.remove_grouping(principal, &role.name);
            },
        )
        .await?;
        Ok(role)
    }

    async fn ensure_open(&self) -> Result<(), PolicyError> {
        match self.state().await {
            EngineState::Closed => Err(PolicyError::NotReady {
                state: EngineState::Closed,
            }),
            _ => Ok(()),
        }
    }

    async fn read<T, F>(&self, operation: &str, call: F) -> Result<T, PolicyError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(with_timeout(self.timeouts.read_timeout(), operation, call).await?)
    }

    /// Run a durable write, then mirror it into the index. Caller holds the writer gate.
    async fn write_through<T, F>(
        &self,
        operation: &str,
        write: F,
        apply: impl FnOnce(&mut PolicyIndex, &T),
    ) -> Result<T, PolicyError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let pending = PendingWrite::arm(&self.in_doubt, operation);
        let result = with_timeout(self.timeouts.write_timeout(), operation, write).await;
        match result {
            Ok(value) => {
                let mut shared = self.shared.write().await;
                apply(&mut shared.index, &value);
                pending.disarm();
                Ok(value)
            }
            Err(err) => {
                if err.is_unavailable() {
                    let mut shared = self.shared.write().await;
                    if shared.state == EngineState::Ready {
                        shared.state = EngineState::Stale;
                    }
                    warn!(operation, error = %err, "policy store write outcome unknown; index marked stale");
                }
                pending.disarm();
                Err(err.into())
            }
        }
    }

    /// Answer from the index, rebuilding it first when stale.
    async fn read_index<T>(&self, read: impl Fn(&PolicyIndex) -> T) -> Result<T, PolicyError> {
        {
            let shared = self.shared.read().await;
            match shared.state {
                EngineState::Ready if !self.in_doubt.load(Ordering::Acquire) => {
                    return Ok(read(&shared.index));
                }
                EngineState::Ready | EngineState::Stale => {}
                state => return Err(PolicyError::NotReady { state }),
            }
        }

        {
            let _writer = self.writer.lock().await;
            if self.state().await == EngineState::Stale {
                warn!("policy index is stale; rebuilding before answering");
                self.rebuild().await?;
            }
        }

        let shared = self.shared.read().await;
        match shared.state {
            EngineState::Ready => Ok(read(&shared.index)),
            state => Err(PolicyError::NotReady { state }),
        }
    }

    /// Build a fresh index and swap it in. Caller holds the writer gate.
    async fn rebuild(&self) -> Result<LoadSummary, PolicyError> {
        self.ensure_open().await?;
        let limit = self.timeouts.read_timeout();
        let mut index = PolicyIndex::new();
        let mut errors = LoadErrors::default();

        let roles = with_timeout(limit, "list_roles", self.store.list_roles()).await?;
        for role in &roles {
            match with_timeout(
                limit,
                "get_role_permissions",
                self.store.get_role_permissions(role.id),
            )
            .await
            {
                Ok(permissions) => {
                    for permission in permissions {
                        index.add_grant(&role.name, permission.resource, permission.action);
                    }
                }
                Err(error) => errors.failures.push(LoadFailure {
                    subject: format!("role '{}'", role.name),
                    error,
                }),
            }
        }

        let principals = with_timeout(limit, "list_principals", self.store.list_principals()).await?;
        for principal in &principals {
            match with_timeout(
                limit,
                "get_principal_roles",
                self.store.get_principal_roles(principal.id),
            )
            .await
            {
                Ok(roles) => {
                    for role in roles {
                        index.add_grouping(principal.id, &role.name);
                    }
                }
                Err(error) => errors.failures.push(LoadFailure {
                    subject: format!("principal {}", principal.id),
                    error,
                }),
            }
        }

        let summary = LoadSummary {
            roles: roles.len(),
            principals: principals.len(),
            grants: index.grant_count(),
            groupings: index.grouping_count(),
        };

        {
            let mut shared = self.shared.write().await;
            shared.index = index;
            shared.state = EngineState::Ready;
            self.in_doubt.store(false, Ordering::Release);
        }

        if errors.is_empty() {
            info!(
                roles = summary.roles,
                principals = summary.principals,
                grants = summary.grants,
                groupings = summary.groupings,
                "policy index loaded"
            );
            Ok(summary)
        } else {
            warn!(failures = errors.len(), "policy index loaded with failures");
            Err(errors.into())
        }
    }
}
