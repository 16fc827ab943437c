//! End-to-end behaviour of the authorization service over the in-memory stores.

use async_trait::async_trait;
use chrono::Duration;
use gatekeep_core::{
    ActionType, CredentialStore, ManualClock, NewPrincipal, PrincipalId, PrincipalRecord,
    ResourceType, StoreConfig, StoreError, TokenConfig,
};
use gatekeep_policy::PolicyEngine;
use gatekeep_service::{AuthError, AuthorizationService, ErrorKind};
use gatekeep_store::{Argon2Hasher, MemoryStore};
use gatekeep_token::{KeyPair, TokenManager};
use std::sync::Arc;

const PASSWORD: &str = "s3cret-pass";

struct Harness {
    service: AuthorizationService,
    clock: ManualClock,
}

fn build(credentials: Arc<dyn CredentialStore>, store: Arc<MemoryStore>, timeouts: StoreConfig) -> Harness {
    let clock = ManualClock::starting_now();
    let token_config = TokenConfig {
        ttl_secs: 3600,
        refresh_grace_secs: 600,
        ..TokenConfig::default()
    };
    let tokens = TokenManager::new(KeyPair::generate().unwrap(), &token_config)
        .with_clock(Arc::new(clock.clone()));
    let engine = PolicyEngine::new(store, timeouts.clone());
    let hasher = Argon2Hasher::with_params(1024, 1, 1).unwrap();

    let service = AuthorizationService::new(
        credentials,
        Arc::new(hasher),
        Arc::new(tokens),
        Arc::new(engine),
        timeouts,
    );
    Harness { service, clock }
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let harness = build(store.clone(), store, StoreConfig::default());
    harness.service.load_policies().await.unwrap();
    harness
}

fn assert_kind<T: std::fmt::Debug>(result: Result<T, AuthError>, kind: ErrorKind) -> AuthError {
    let err = result.expect_err("expected an error");
    assert_eq!(err.kind(), kind, "unexpected error: {err}");
    err
}

#[tokio::test]
async fn test_editor_may_update_products() {
    let h = harness().await;
    let svc = &h.service;

    let alice = svc
        .register("alice", PASSWORD, "alice@example.com", None)
        .await
        .unwrap();
    let editor = svc.create_role("editor", "edits the catalogue").await.unwrap();
    let update = svc
        .create_permission("update products", "", ResourceType::Product, ActionType::Update)
        .await
        .unwrap();
    svc.assign_permission_to_role(editor.id, update.id).await.unwrap();
    svc.assign_role_to_user(alice.principal_id(), editor.id)
        .await
        .unwrap();

    assert!(
        svc.check_permission(alice.principal_id(), ResourceType::Product, ActionType::Update)
            .await
            .unwrap()
    );
    assert!(
        !svc.check_permission(alice.principal_id(), ResourceType::Product, ActionType::Delete)
            .await
            .unwrap()
    );
    assert_eq!(
        svc.authorize(&alice.token, ResourceType::Product, ActionType::Update)
            .await
            .unwrap(),
        alice.principal_id()
    );
    assert_kind(
        svc.authorize(&alice.token, ResourceType::Product, ActionType::Delete)
            .await,
        ErrorKind::Forbidden,
    );

    let roles = svc.get_user_roles(alice.principal_id()).await.unwrap();
    assert_eq!(roles, vec![editor.clone()]);
    assert_eq!(svc.get_role_permissions(editor.id).await.unwrap(), vec![update]);
    assert_eq!(
        svc.engine().roles_for(alice.principal_id()).await.unwrap(),
        vec!["editor"]
    );
}

#[tokio::test]
async fn test_role_deletion_cascades() {
    let h = harness().await;
    let svc = &h.service;

    let alice = svc
        .register("alice", PASSWORD, "alice@example.com", None)
        .await
        .unwrap();
    let editor = svc.create_role("editor", "").await.unwrap();
    let update = svc
        .create_permission("update products", "", ResourceType::Product, ActionType::Update)
        .await
        .unwrap();
    svc.assign_permission_to_role(editor.id, update.id).await.unwrap();
    svc.assign_role_to_user(alice.principal_id(), editor.id)
        .await
        .unwrap();

    svc.delete_role(editor.id).await.unwrap();

    assert!(
        !svc.check_permission(alice.principal_id(), ResourceType::Product, ActionType::Update)
            .await
            .unwrap()
    );
    assert!(svc.get_user_roles(alice.principal_id()).await.unwrap().is_empty());
    assert_kind(svc.get_role_permissions(editor.id).await, ErrorKind::NotFound);
    assert_kind(svc.delete_role(editor.id).await, ErrorKind::NotFound);

    // a fresh rebuild agrees with the mirrored index
    svc.load_policies().await.unwrap();
    assert!(
        !svc.check_permission(alice.principal_id(), ResourceType::Product, ActionType::Update)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_removals_take_effect_immediately() {
    let h = harness().await;
    let svc = &h.service;

    let bob = svc
        .register("bob", PASSWORD, "bob@example.com", Some("+1 555 0100"))
        .await
        .unwrap();
    let clerk = svc.create_role("clerk", "").await.unwrap();
    let manager = svc.create_role("manager", "").await.unwrap();
    let read = svc
        .create_permission("read orders", "", ResourceType::Order, ActionType::Read)
        .await
        .unwrap();
    let list = svc
        .create_permission("list orders", "", ResourceType::Order, ActionType::List)
        .await
        .unwrap();
    for role in [clerk.id, manager.id] {
        svc.assign_permission_to_role(role, read.id).await.unwrap();
    }
    svc.assign_permission_to_role(clerk.id, list.id).await.unwrap();
    svc.assign_role_to_user(bob.principal_id(), clerk.id)
        .await
        .unwrap();
    svc.assign_role_to_user(bob.principal_id(), manager.id)
        .await
        .unwrap();

    svc.remove_permission_from_role(clerk.id, list.id)
        .await
        .unwrap();
    assert!(
        !svc.check_permission(bob.principal_id(), ResourceType::Order, ActionType::List)
            .await
            .unwrap()
    );

    svc.delete_permission(read.id).await.unwrap();
    assert!(
        !svc.check_permission(bob.principal_id(), ResourceType::Order, ActionType::Read)
            .await
            .unwrap()
    );
    assert!(svc.get_role_permissions(manager.id).await.unwrap().is_empty());

    svc.remove_role_from_user(bob.principal_id(), manager.id)
        .await
        .unwrap();
    assert_eq!(
        svc.get_user_roles(bob.principal_id()).await.unwrap(),
        vec![clerk]
    );
    assert_kind(
        svc.remove_role_from_user(bob.principal_id(), manager.id)
            .await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn test_login_failures_are_distinct_but_closed() {
    let h = harness().await;
    let svc = &h.service;
    let registered = svc
        .register("carol", PASSWORD, "carol@example.com", None)
        .await
        .unwrap();

    let issued = svc.login("carol@example.com", PASSWORD).await.unwrap();
    assert_eq!(issued.principal_id(), registered.principal_id());
    assert_eq!(
        svc.validate_token(&issued.token).unwrap(),
        registered.principal_id()
    );

    let unknown = assert_kind(
        svc.login("nobody@example.com", PASSWORD).await,
        ErrorKind::Unauthenticated,
    );
    let wrong = assert_kind(
        svc.login("carol@example.com", "not-the-password").await,
        ErrorKind::Unauthenticated,
    );
    assert_eq!(unknown.message(), "user does not exist");
    assert_eq!(wrong.message(), "incorrect password");
}

#[tokio::test]
async fn test_registration_rules() {
    let h = harness().await;
    let svc = &h.service;

    assert_kind(
        svc.register("al", PASSWORD, "al@example.com", None).await,
        ErrorKind::Invalid,
    );
    assert_kind(
        svc.register("alice", "short", "alice@example.com", None)
            .await,
        ErrorKind::Invalid,
    );
    assert_kind(
        svc.register("alice", PASSWORD, "not-an-email", None).await,
        ErrorKind::Invalid,
    );
    assert_kind(
        svc.register("alice", PASSWORD, "alice@example.com", Some("call me"))
            .await,
        ErrorKind::Invalid,
    );

    svc.register("alice", PASSWORD, "alice@example.com", None)
        .await
        .unwrap();
    let dup = assert_kind(
        svc.register("alice2", PASSWORD, "alice@example.com", None)
            .await,
        ErrorKind::Conflict,
    );
    assert!(dup.message().starts_with("failed to create user"));
}

#[tokio::test]
async fn test_logout_revokes_only_that_token() {
    let h = harness().await;
    let svc = &h.service;
    let first = svc
        .register("dave", PASSWORD, "dave@example.com", None)
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let second = svc.login("dave@example.com", PASSWORD).await.unwrap();

    svc.logout(&first.token).await.unwrap();

    assert_kind(svc.validate_token(&first.token), ErrorKind::Unauthenticated);
    assert_kind(
        svc.authorize(&first.token, ResourceType::Order, ActionType::Read)
            .await,
        ErrorKind::Unauthenticated,
    );
    assert_eq!(
        svc.validate_token(&second.token).unwrap(),
        first.principal_id()
    );
    assert_kind(svc.refresh_token(&first.token), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn test_token_error_kinds() {
    let h = harness().await;
    let svc = &h.service;
    let erin = svc
        .register("erin", PASSWORD, "erin@example.com", None)
        .await
        .unwrap();

    assert_kind(svc.validate_token("garbage"), ErrorKind::Invalid);
    assert_kind(svc.logout("garbage").await, ErrorKind::Invalid);

    let other_keys = TokenManager::new(KeyPair::generate().unwrap(), &TokenConfig::default());
    let forged = other_keys.issue(erin.principal_id()).unwrap();
    assert_kind(svc.validate_token(&forged.token), ErrorKind::Unauthenticated);

    h.clock.advance(Duration::seconds(3601));
    assert_kind(svc.validate_token(&erin.token), ErrorKind::Unauthenticated);
    assert_kind(
        svc.authorize(&erin.token, ResourceType::User, ActionType::Read)
            .await,
        ErrorKind::Unauthenticated,
    );
}

#[tokio::test]
async fn test_refresh_within_grace() {
    let h = harness().await;
    let svc = &h.service;
    let frank = svc
        .register("frank", PASSWORD, "frank@example.com", None)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(3600 + 300));
    let refreshed = svc.refresh_token(&frank.token).unwrap();
    assert_eq!(
        svc.validate_token(&refreshed.token).unwrap(),
        frank.principal_id()
    );
    assert_kind(svc.validate_token(&frank.token), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn test_check_permission_requires_known_principal() {
    let h = harness().await;
    assert_kind(
        h.service
            .check_permission(PrincipalId(404), ResourceType::Order, ActionType::Read)
            .await,
        ErrorKind::NotFound,
    );
}

#[tokio::test]
async fn test_admin_input_rules() {
    let h = harness().await;
    let svc = &h.service;

    assert_kind(svc.create_role("", "").await, ErrorKind::Invalid);
    assert_kind(svc.create_role("has space", "").await, ErrorKind::Invalid);

    svc.create_role("editor", "").await.unwrap();
    assert_kind(svc.create_role("editor", "").await, ErrorKind::Conflict);

    svc.create_permission("read users", "", ResourceType::User, ActionType::Read)
        .await
        .unwrap();
    assert_kind(
        svc.create_permission("read users again", "", ResourceType::User, ActionType::Read)
            .await,
        ErrorKind::Conflict,
    );
    assert_kind(
        svc.create_permission(" ", "", ResourceType::User, ActionType::List)
            .await,
        ErrorKind::Invalid,
    );
}

#[tokio::test]
async fn test_unloaded_engine_is_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let h = build(store.clone(), store, StoreConfig::default());
    let gina = h
        .service
        .register("gina", PASSWORD, "gina@example.com", None)
        .await
        .unwrap();

    assert_kind(
        h.service
            .check_permission(gina.principal_id(), ResourceType::Order, ActionType::Read)
            .await,
        ErrorKind::StoreUnavailable,
    );

    h.service.load_policies().await.unwrap();
    h.service.shutdown().await;
    assert_kind(
        h.service
            .authorize(&gina.token, ResourceType::Order, ActionType::Read)
            .await,
        ErrorKind::StoreUnavailable,
    );
}

/// A credential store that never answers.
struct HangingCredentials;

#[async_trait]
impl CredentialStore for HangingCredentials {
    async fn find_principal_by_email(&self, _email: &str) -> Result<PrincipalRecord, StoreError> {
        std::future::pending().await
    }

    async fn find_principal_by_id(&self, _id: PrincipalId) -> Result<PrincipalRecord, StoreError> {
        std::future::pending().await
    }

    async fn create_principal(&self, _principal: NewPrincipal) -> Result<PrincipalId, StoreError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_slow_credential_store_times_out() {
    let timeouts = StoreConfig {
        read_timeout_ms: 20,
        write_timeout_ms: 20,
    };
    let h = build(Arc::new(HangingCredentials), Arc::new(MemoryStore::new()), timeouts);
    h.service.load_policies().await.unwrap();

    assert_kind(
        h.service.login("hank@example.com", PASSWORD).await,
        ErrorKind::StoreUnavailable,
    );
    assert_kind(
        h.service
            .register("hank", PASSWORD, "hank@example.com", None)
            .await,
        ErrorKind::StoreUnavailable,
    );
}
