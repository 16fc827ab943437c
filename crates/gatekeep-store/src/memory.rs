//! In-memory credential and policy storage.

use async_trait::async_trait;
use gatekeep_core::{
    Clock, CredentialStore, NewPermission, NewPrincipal, Permission, PermissionId, PolicyStore,
    Principal, PrincipalId, PrincipalRecord, Role, RoleId, StoreError, SystemClock,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    principals: BTreeMap<PrincipalId, PrincipalRecord>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    grants: BTreeSet<(RoleId, PermissionId)>,
    groupings: BTreeSet<(PrincipalId, RoleId)>,
    last_principal: u32,
    last_role: u64,
    last_permission: u64,
}

impl Tables {
    fn role(&self, id: RoleId) -> Result<&Role, StoreError> {
        self.roles
            .get(&id)
            .ok_or_else(|| StoreError::not_found("role", id))
    }

    fn permission(&self, id: PermissionId) -> Result<&Permission, StoreError> {
        self.permissions
            .get(&id)
            .ok_or_else(|| StoreError::not_found("permission", id))
    }

    fn principal(&self, id: PrincipalId) -> Result<&PrincipalRecord, StoreError> {
        self.principals
            .get(&id)
            .ok_or_else(|| StoreError::not_found("principal", id))
    }
}

/// Store backed by ordered maps behind a reader/writer lock.
///
/// Ids are assigned sequentially starting at 1 and never reused. Listings come back
/// in id order.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for `created_at` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire write lock: {e}")))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_principal_by_email(&self, email: &str) -> Result<PrincipalRecord, StoreError> {
        let tables = self.read()?;
        tables
            .principals
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StoreError::not_found("principal", email))
    }

    async fn find_principal_by_id(&self, id: PrincipalId) -> Result<PrincipalRecord, StoreError> {
        Ok(self.read()?.principal(id)?.clone())
    }

    async fn create_principal(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError> {
        let mut tables = self.write()?;

        if let Some(existing) = tables.principals.values().find(|p| {
            p.email.eq_ignore_ascii_case(&principal.email) || p.username == principal.username
        }) {
            let field = if existing.username == principal.username {
                "username"
            } else {
                "email"
            };
            return Err(StoreError::Conflict(format!("{field} is already registered")));
        }

        tables.last_principal = tables
            .last_principal
            .checked_add(1)
            .ok_or_else(|| StoreError::Unavailable("principal id space exhausted".to_string()))?;
        let id = PrincipalId(tables.last_principal);
        tables.principals.insert(
            id,
            PrincipalRecord {
                id,
                username: principal.username,
                email: principal.email,
                phone: principal.phone,
                password_digest: principal.password_digest,
                created_at: self.clock.now(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn get_role(&self, id: RoleId) -> Result<Role, StoreError> {
        Ok(self.read()?.role(id)?.clone())
    }

    async fn create_role(&self, name: &str, description: &str) -> Result<Role, StoreError> {
        let mut tables = self.write()?;
        if tables.roles.values().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!("role '{name}' already exists")));
        }

        tables.last_role += 1;
        let role = Role {
            id: RoleId(tables.last_role),
            name: name.to_string(),
            description: description.to_string(),
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .roles
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("role", id))?;
        tables.grants.retain(|(role, _)| *role != id);
        tables.groupings.retain(|(_, role)| *role != id);
        Ok(())
    }

    async fn get_role_permissions(&self, id: RoleId) -> Result<Vec<Permission>, StoreError> {
        let tables = self.read()?;
        tables.role(id)?;
        tables
            .grants
            .iter()
            .filter(|(role, _)| *role == id)
            .map(|(_, permission)| tables.permission(*permission).cloned())
            .collect()
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> Result<Permission, StoreError> {
        let mut tables = self.write()?;
        if tables
            .permissions
            .values()
            .any(|p| p.resource == permission.resource && p.action == permission.action)
        {
            return Err(StoreError::Conflict(format!(
                "permission {} {} already exists",
                permission.action, permission.resource
            )));
        }

        tables.last_permission += 1;
        let created = Permission {
            id: PermissionId(tables.last_permission),
            name: permission.name,
            description: permission.description,
            resource: permission.resource,
            action: permission.action,
        };
        tables.permissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_permission(&self, id: PermissionId) -> Result<Permission, StoreError> {
        Ok(self.read()?.permission(id)?.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .permissions
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("permission", id))?;
        tables.grants.retain(|(_, permission)| *permission != id);
        Ok(())
    }

    async fn grant_permission(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.role(role)?;
        tables.permission(permission)?;
        tables.grants.insert((role, permission));
        Ok(())
    }

    async fn revoke_permission(
        &self,
        role: RoleId,
        permission: PermissionId,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.grants.remove(&(role, permission)) {
            return Err(StoreError::not_found(
                "grant",
                format!("role {role} / permission {permission}"),
            ));
        }
        Ok(())
    }

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError> {
        Ok(self
            .read()?
            .principals
            .values()
            .map(PrincipalRecord::principal)
            .collect())
    }

    async fn get_principal_roles(&self, principal: PrincipalId) -> Result<Vec<Role>, StoreError> {
        let tables = self.read()?;
        tables.principal(principal)?;
        tables
            .groupings
            .iter()
            .filter(|(p, _)| *p == principal)
            .map(|(_, role)| tables.role(*role).cloned())
            .collect()
    }

    async fn assign_role(&self, principal: PrincipalId, role: RoleId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.principal(principal)?;
        tables.role(role)?;
        tables.groupings.insert((principal, role));
        Ok(())
    }

    async fn unassign_role(&self, principal: PrincipalId, role: RoleId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.groupings.remove(&(principal, role)) {
            return Err(StoreError::not_found(
                "role assignment",
                format!("principal {principal} / role {role}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_core::{ActionType, ResourceType};

    fn new_principal(username: &str, email: &str) -> NewPrincipal {
        NewPrincipal {
            username: username.to_string(),
            email: email.to_string(),
            phone: None,
            password_digest: "digest".to_string(),
        }
    }

    fn new_permission(resource: ResourceType, action: ActionType) -> NewPermission {
        NewPermission {
            name: format!("{resource}:{action}"),
            description: String::new(),
            resource,
            action,
        }
    }

    #[tokio::test]
    async fn test_principal_lookup_and_conflicts() {
        let store = MemoryStore::new();
        let id = store
            .create_principal(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();

        let found = store
            .find_principal_by_email("ALICE@example.com")
            .await
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(store.find_principal_by_id(id).await.unwrap().username, "alice");

        let dup_email = store
            .create_principal(new_principal("alice2", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(dup_email, StoreError::Conflict(ref m) if m.contains("email")));

        let dup_name = store
            .create_principal(new_principal("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(dup_name, StoreError::Conflict(ref m) if m.contains("username")));

        assert!(
            store
                .find_principal_by_email("nobody@example.com")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_role_and_permission_uniqueness() {
        let store = MemoryStore::new();
        store.create_role("editor", "").await.unwrap();
        assert!(matches!(
            store.create_role("editor", "again").await,
            Err(StoreError::Conflict(_))
        ));

        store
            .create_permission(new_permission(ResourceType::Product, ActionType::Update))
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_permission(new_permission(ResourceType::Product, ActionType::Update))
                .await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_role_cascades() {
        let store = MemoryStore::new();
        let alice = store
            .create_principal(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();
        let editor = store.create_role("editor", "").await.unwrap();
        let viewer = store.create_role("viewer", "").await.unwrap();
        let update = store
            .create_permission(new_permission(ResourceType::Product, ActionType::Update))
            .await
            .unwrap();

        store.grant_permission(editor.id, update.id).await.unwrap();
        store.grant_permission(viewer.id, update.id).await.unwrap();
        store.assign_role(alice, editor.id).await.unwrap();
        store.assign_role(alice, viewer.id).await.unwrap();

        store.delete_role(editor.id).await.unwrap();

        let roles = store.get_principal_roles(alice).await.unwrap();
        assert_eq!(roles, vec![viewer.clone()]);
        assert!(store.get_role_permissions(editor.id).await.unwrap_err().is_not_found());
        assert_eq!(store.get_role_permissions(viewer.id).await.unwrap(), vec![update]);
    }

    #[tokio::test]
    async fn test_delete_permission_cascades_grants() {
        let store = MemoryStore::new();
        let editor = store.create_role("editor", "").await.unwrap();
        let update = store
            .create_permission(new_permission(ResourceType::Product, ActionType::Update))
            .await
            .unwrap();
        store.grant_permission(editor.id, update.id).await.unwrap();

        store.delete_permission(update.id).await.unwrap();

        assert!(store.get_role_permissions(editor.id).await.unwrap().is_empty());
        assert!(store.get_permission(update.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_grant_and_assign_are_idempotent() {
        let store = MemoryStore::new();
        let alice = store
            .create_principal(new_principal("alice", "alice@example.com"))
            .await
            .unwrap();
        let editor = store.create_role("editor", "").await.unwrap();
        let read = store
            .create_permission(new_permission(ResourceType::Order, ActionType::Read))
            .await
            .unwrap();

        store.grant_permission(editor.id, read.id).await.unwrap();
        store.grant_permission(editor.id, read.id).await.unwrap();
        store.assign_role(alice, editor.id).await.unwrap();
        store.assign_role(alice, editor.id).await.unwrap();

        assert_eq!(store.get_role_permissions(editor.id).await.unwrap().len(), 1);
        assert_eq!(store.get_principal_roles(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_edges_require_existing_endpoints() {
        let store = MemoryStore::new();
        let editor = store.create_role("editor", "").await.unwrap();

        assert!(
            store
                .grant_permission(editor.id, PermissionId(99))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            store
                .assign_role(PrincipalId(99), editor.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            store
                .unassign_role(PrincipalId(99), editor.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let store = MemoryStore::new();
        let first = store.create_role("a", "").await.unwrap();
        store.delete_role(first.id).await.unwrap();
        let second = store.create_role("a", "").await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
