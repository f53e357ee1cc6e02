//! Access control evaluator
//!
//! Each target `(system, function)` has zero or one [`AccessConfig`]. A target
//! without a configured and enforced entry is open to every caller. An
//! enforced entry delegates the decision to the [`DecisionProvider`]
//! registered for its `(access_system, access_function)` pair. Definite
//! answers are memoized in the [`AccessCache`] under the entry's revision,
//! unless an invalidation ran while the provider was deciding; delegation
//! failures deny without being memoized.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sof_cache::{AccessCache, CacheStats, CallAccessKey};
use sof_observe::logging::{access_span, record_access_decision};
use sof_repository::AccessConfigRepository;
use sof_storage::{StorageBackend, Transaction};
use sof_types::{AccessConfig, Account, Decision, DecisionRequest, FunctionSelector, SystemId};
use thiserror::Error;
use tracing::{debug, warn, Instrument};

use crate::error::{RecordKind, RegistryError, Result};

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("call context is missing field '{0}'")]
    MissingContext(&'static str),

    #[error("call context is invalid: {0}")]
    InvalidContext(String),

    #[error("decision lookup failed: {0}")]
    Lookup(#[from] RegistryError),

    #[error("decision failed: {0}")]
    Failed(String),
}

/// A decision system an enforced target delegates to
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// `Ok(true)` allows the call, `Ok(false)` denies it; an error denies it too
    async fn decide(&self, request: &DecisionRequest) -> std::result::Result<bool, DecisionError>;
}

type ProviderKey = (SystemId, FunctionSelector);

#[derive(Clone)]
pub struct AccessControl {
    storage: Arc<dyn StorageBackend>,
    repo: AccessConfigRepository,
    cache: Option<Arc<AccessCache>>,
    providers: Arc<RwLock<HashMap<ProviderKey, Arc<dyn DecisionProvider>>>>,
}

impl AccessControl {
    pub fn new(storage: Arc<dyn StorageBackend>, cache: Option<Arc<AccessCache>>) -> Self {
        Self {
            storage,
            repo: AccessConfigRepository::new(),
            cache,
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Bind a decision system to `(access_system, access_function)`, replacing any previous one
    pub fn register_provider(
        &self,
        access_system: SystemId,
        access_function: FunctionSelector,
        provider: Arc<dyn DecisionProvider>,
    ) {
        self.providers
            .write()
            .insert((access_system, access_function), provider);
        debug!(system = %access_system.label(), function = %access_function, "Decision provider registered");
    }

    fn provider(&self, access_system: &SystemId, access_function: &FunctionSelector) -> Option<Arc<dyn DecisionProvider>> {
        self.providers
            .read()
            .get(&(*access_system, *access_function))
            .cloned()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The configured entry for a target
    pub async fn access_config(&self, system: &SystemId, function: &FunctionSelector) -> Result<Option<AccessConfig>> {
        Ok(self
            .repo
            .configured(self.storage.as_ref(), system, function)
            .await?)
    }

    /// Every configured entry
    pub async fn access_configs(&self) -> Result<Vec<AccessConfig>> {
        Ok(self.repo.list(self.storage.as_ref()).await?)
    }

    /// Point a target at a decision system. A new entry starts staged
    /// (`enforcement = false`); rewriting an entry keeps its enforcement flag.
    pub(crate) async fn configure_in(
        &self,
        txn: &mut dyn Transaction,
        target_system: &SystemId,
        target_function: &FunctionSelector,
        access_system: &SystemId,
        access_function: &FunctionSelector,
    ) -> Result<AccessConfig> {
        let existing = self.repo.get(&*txn, target_system, target_function).await?;
        let revision = existing.as_ref().map_or(0, |config| config.revision) + 1;
        let enforcement = existing
            .as_ref()
            .is_some_and(|config| config.configured && config.enforcement);

        let config = AccessConfig {
            configured: true,
            target_system: *target_system,
            target_function: *target_function,
            access_system: *access_system,
            access_function: *access_function,
            enforcement,
            revision,
        };
        self.repo.put(txn, &config)?;
        debug!(
            target = %target_system.label(),
            function = %target_function,
            access = %access_system.label(),
            revision,
            "Access configured"
        );
        Ok(config)
    }

    async fn configured_in(
        &self,
        txn: &dyn Transaction,
        system: &SystemId,
        function: &FunctionSelector,
    ) -> Result<AccessConfig> {
        self.repo
            .configured(txn, system, function)
            .await?
            .ok_or_else(|| RegistryError::not_found(RecordKind::AccessConfig, format!("{}:{}", system.label(), function)))
    }

    pub(crate) async fn set_enforcement_in(
        &self,
        txn: &mut dyn Transaction,
        system: &SystemId,
        function: &FunctionSelector,
        enforcement: bool,
    ) -> Result<AccessConfig> {
        let mut config = self.configured_in(&*txn, system, function).await?;
        config.enforcement = enforcement;
        config.revision += 1;
        self.repo.put(txn, &config)?;
        debug!(target = %system.label(), %function, enforcement, revision = config.revision, "Enforcement changed");
        Ok(config)
    }

    pub(crate) async fn remove_config_in(
        &self,
        txn: &mut dyn Transaction,
        system: &SystemId,
        function: &FunctionSelector,
    ) -> Result<AccessConfig> {
        let mut config = self.configured_in(&*txn, system, function).await?;
        config.configured = false;
        config.enforcement = false;
        config.revision += 1;
        self.repo.put(txn, &config)?;
        debug!(target = %system.label(), %function, revision = config.revision, "Access config removed");
        Ok(config)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Decide whether `request.caller` may call the target
    pub async fn evaluate(&self, request: &DecisionRequest) -> Result<Decision> {
        let span = access_span(
            &request.caller.to_string(),
            &request.target_system.label(),
            &request.target_function.to_string(),
        );
        self.evaluate_in_span(request, &span)
            .instrument(span.clone())
            .await
    }

    async fn evaluate_in_span(&self, request: &DecisionRequest, span: &tracing::Span) -> Result<Decision> {
        // Taken before any state is read, so a decision made from state that a
        // concurrent mutation has since invalidated is never stored
        let generation = self.cache.as_ref().map(|cache| cache.generation());
        let config = self
            .repo
            .get(self.storage.as_ref(), &request.target_system, &request.target_function)
            .await?;
        let Some(config) = config.filter(AccessConfig::is_enforced) else {
            debug!("Target not enforced, allowing");
            record_access_decision(span, Decision::Allow.as_str(), false);
            return Ok(Decision::Allow);
        };

        let key = CallAccessKey::new(
            request.target_system,
            request.target_function,
            request.caller,
            config.revision,
        )
        .with_context(request.context.as_ref());
        if let Some(cache) = &self.cache {
            if let Some(decision) = cache.get(&key).await {
                debug!(decision = decision.as_str(), "Call access decided (from cache)");
                record_access_decision(span, decision.as_str(), true);
                return Ok(decision);
            }
        }

        let Some(provider) = self.provider(&config.access_system, &config.access_function) else {
            warn!(
                access_system = %config.access_system.label(),
                access_function = %config.access_function,
                "No decision provider bound, denying"
            );
            record_access_decision(span, Decision::Deny.as_str(), false);
            return Ok(Decision::Deny);
        };

        let decision = match provider.decide(request).await {
            Ok(allowed) => Decision::from_allowed(allowed),
            Err(error) => {
                warn!(%error, "Decision provider failed, denying");
                record_access_decision(span, Decision::Deny.as_str(), false);
                return Ok(Decision::Deny);
            }
        };

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.put_at(key, decision, generation).await;
        }
        debug!(decision = decision.as_str(), revision = config.revision, "Call access decided");
        record_access_decision(span, decision.as_str(), false);
        Ok(decision)
    }

    /// [`evaluate`](Self::evaluate), with a denial turned into [`RegistryError::AccessDenied`]
    pub async fn enforce(&self, request: &DecisionRequest) -> Result<()> {
        match self.evaluate(request).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(RegistryError::AccessDenied {
                caller: request.caller,
                system: request.target_system,
                function: request.target_function,
            }),
        }
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// The memoized decision for `request`, valid under the target's current configuration
    pub async fn cached_decision(&self, request: &DecisionRequest) -> Result<Option<Decision>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let Some(config) = self
            .access_config(&request.target_system, &request.target_function)
            .await?
        else {
            return Ok(None);
        };
        let key = CallAccessKey::new(
            request.target_system,
            request.target_function,
            request.caller,
            config.revision,
        )
        .with_context(request.context.as_ref());
        Ok(cache.peek(&key).await)
    }

    pub async fn invalidate_target(&self, system: &SystemId, function: &FunctionSelector) {
        if let Some(cache) = &self.cache {
            cache.invalidate_target(system, function).await;
        }
    }

    pub async fn invalidate_caller(&self, caller: &Account) {
        if let Some(cache) = &self.cache {
            cache.invalidate_caller(caller).await;
        }
    }

    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all().await;
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }
}
