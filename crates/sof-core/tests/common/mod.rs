//! Helper utilities for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sof_cache::AccessCache;
use sof_core::{DecisionError, DecisionProvider, Registry, RegistrySettings};
use sof_storage::MemoryBackend;
use tokio::sync::Notify;
use sof_types::{Account, Decision, DecisionRequest, EntityId, FunctionSelector, RoleId, SystemId, TagId, TagKind};

/// Account that initialized the registry and holds the access-admin role
pub const OWNER: u64 = 1;

/// Test fixture: an initialized registry over a memory backend with caching on
pub struct TestFixture {
    pub backend: Arc<MemoryBackend>,
    pub registry: Registry,
    pub owner: Account,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_settings(RegistrySettings::default()).await
    }

    pub async fn with_settings(settings: RegistrySettings) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let registry = Registry::builder()
            .backend(backend.clone())
            .settings(settings)
            .cache(Arc::new(AccessCache::default()))
            .build();
        let owner = Account::from(OWNER);
        registry.initialize(&owner).await.expect("initialize registry");

        Self {
            backend,
            registry,
            owner,
        }
    }

    /// Create a self-administered role held by the owner
    pub async fn role(&self, name: &str) -> RoleId {
        let role = RoleId::from_name(name);
        self.registry
            .create_role(&self.owner, &role, &role)
            .await
            .expect("create role");
        role
    }

    pub async fn tag(&self, kind: TagKind, name: &str) -> TagId {
        let tag = TagId::new(kind, name);
        self.registry
            .create_tag(&self.owner, &tag)
            .await
            .expect("create tag");
        tag
    }

    pub async fn entity(&self, id: u64, role: &RoleId) -> EntityId {
        let id = EntityId::from(id);
        self.registry
            .register_entity(&self.owner, &id, role, &[])
            .await
            .expect("register entity");
        id
    }

    pub async fn class(&self, id: u64, role: &RoleId) -> EntityId {
        let id = EntityId::from(id);
        self.registry
            .register_class(&self.owner, &id, role, &[])
            .await
            .expect("register class");
        id
    }

    pub async fn object(&self, id: u64, role: &RoleId, class: Option<&EntityId>) -> EntityId {
        let id = EntityId::from(id);
        self.registry
            .register_object(&self.owner, &id, role, class, &[])
            .await
            .expect("register object");
        id
    }

    /// Point a target at a decision system and turn enforcement on
    pub async fn enforce(
        &self,
        target: (SystemId, FunctionSelector),
        access: (SystemId, FunctionSelector),
    ) {
        self.registry
            .configure_access(&self.owner, &target.0, &target.1, &access.0, &access.1)
            .await
            .expect("configure access");
        self.registry
            .set_enforcement(&self.owner, &target.0, &target.1, true)
            .await
            .expect("enable enforcement");
    }

    /// Decide whether `caller` may call `target`, with no call context
    pub async fn check(&self, caller: &Account, target: (SystemId, FunctionSelector)) -> anyhow::Result<Decision> {
        self.registry
            .check_access(caller, &target.0, &target.1, None)
            .await
            .with_context(|| format!("check {} on {}", caller, target.0.label()))
    }

    pub async fn assert_allowed(&self, caller: &Account, target: (SystemId, FunctionSelector)) {
        let decision = self.check(caller, target).await.unwrap();
        assert_eq!(decision, Decision::Allow, "{} should be allowed on {}", caller, target.0.label());
    }

    pub async fn assert_denied(&self, caller: &Account, target: (SystemId, FunctionSelector)) {
        let decision = self.check(caller, target).await.unwrap();
        assert_eq!(decision, Decision::Deny, "{} should be denied on {}", caller, target.0.label());
    }

    /// Assert that `has_role` agrees with the member array, including positions
    pub async fn assert_members(&self, role: &RoleId, expected: &[Account]) {
        let members = self.registry.role_members(role).await.unwrap();
        let actual: HashSet<_> = members.iter().copied().collect();
        let wanted: HashSet<_> = expected.iter().copied().collect();
        assert_eq!(actual, wanted, "members of {}", role);

        for (index, account) in members.iter().enumerate() {
            let membership = self.registry.roles().membership(role, account).await.unwrap();
            assert!(membership.is_member, "{} should hold {}", account, role);
            assert_eq!(membership.index, index as u64, "index of {} in {}", account, role);
        }
    }
}

/// A target system outside the registry, for gating tests
pub fn external_target() -> (SystemId, FunctionSelector) {
    (
        SystemId::new("evefrontier", "SmartGateSystem"),
        FunctionSelector::from_signature("jump(gate,character)"),
    )
}

pub fn counting_system() -> (SystemId, FunctionSelector) {
    (
        SystemId::new("test", "CountingSystem"),
        FunctionSelector::from_signature("decide(caller)"),
    )
}

/// Decision provider allowing a fixed set of callers and counting invocations
pub struct CountingProvider {
    allowed: HashSet<Account>,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn allowing(allowed: impl IntoIterator<Item = Account>) -> Arc<Self> {
        Arc::new(Self {
            allowed: allowed.into_iter().collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn denying_all() -> Arc<Self> {
        Self::allowing([])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionProvider for CountingProvider {
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.allowed.contains(&request.caller))
    }
}

/// Wraps a provider and holds its first decision, after the inner provider
/// has answered, until [`release`](Self::release) is called
pub struct HeldProvider {
    inner: Arc<dyn DecisionProvider>,
    held: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl HeldProvider {
    pub fn wrap(inner: Arc<dyn DecisionProvider>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            held: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        })
    }

    /// Wait until the first decision has been made and is being held
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl DecisionProvider for HeldProvider {
    async fn decide(&self, request: &DecisionRequest) -> Result<bool, DecisionError> {
        let decision = self.inner.decide(request).await;
        if !self.held.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        decision
    }
}
