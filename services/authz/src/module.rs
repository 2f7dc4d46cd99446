//! The enforcement module: one engine and one store behind one lock.
//!
//! # Purpose
//! [`EnforcementModule`] is the synchronization point between concurrent
//! decisions and concurrent policy mutations. Decisions take the shared side
//! of a `tokio::sync::RwLock`; mutations, reloads and (re)initialization take
//! the exclusive side.
//!
//! # Lifecycle
//! `new` (validates config, no I/O) -> `initialize` (parse model, build store,
//! load rules) -> optional `start` (background reload) -> decisions and
//! mutations -> optional `stop`. Calling `initialize` again swaps in a fresh
//! engine and store without a stop/start cycle.
//!
//! # Key invariants
//! - A mutation persists the full rule set only when it changed something.
//! - A failed save is returned to the caller even though the in-memory rule
//!   set already changed. Store and engine may diverge until the next reload.
//! - A failed `initialize` leaves the previous engine (or none) in place.
use crate::config::{ModuleConfig, WatcherConfig};
use crate::errors::{ConfigError, ModuleError, ModuleResult};
use crate::reload::Reloader;
use async_trait::async_trait;
use castellan_adapter::{SeedRows, build_adapter};
use castellan_policy::{AccessRequest, ModelText, PolicyEngine, PolicyError, RuleKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MODULE_TYPE: &str = "authz.casbin";

pub(crate) type SharedEngine = Arc<RwLock<Option<PolicyEngine>>>;

/// What steps need from a module. Implemented by [`EnforcementModule`] and by
/// test doubles.
#[async_trait]
pub trait PolicyModule: Send + Sync {
    fn name(&self) -> &str;

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> ModuleResult<bool>;

    async fn add_policy(&self, rule: Vec<String>) -> ModuleResult<bool>;

    async fn remove_policy(&self, rule: Vec<String>) -> ModuleResult<bool>;

    async fn add_role_assignment(&self, assignment: Vec<String>) -> ModuleResult<bool>;

    async fn remove_role_assignment(&self, assignment: Vec<String>) -> ModuleResult<bool>;
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Add,
    Remove,
}

pub struct EnforcementModule {
    name: String,
    config: ModuleConfig,
    engine: SharedEngine,
    reloader: Mutex<Option<Reloader>>,
}

impl EnforcementModule {
    /// Validate `config` and build an uninitialized module.
    pub fn new(name: impl Into<String>, config: ModuleConfig) -> ModuleResult<Self> {
        let name = name.into();
        if let Err(source) = config.validate() {
            return Err(ModuleError::Config {
                module: name,
                source,
            });
        }
        Ok(Self {
            name,
            config,
            engine: Arc::new(RwLock::new(None)),
            reloader: Mutex::new(None),
        })
    }

    /// Build from a raw configuration mapping.
    pub fn from_value(name: impl Into<String>, config: &serde_json::Value) -> ModuleResult<Self> {
        let name = name.into();
        match ModuleConfig::from_value(config) {
            Ok(config) => Self::new(name, config),
            Err(source) => Err(ModuleError::Config {
                module: name,
                source,
            }),
        }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Parse the model, build the store and load its rules. Replaces any
    /// previous engine on success.
    ///
    /// # Errors
    /// - [`ModuleError::Config`] for adapter settings that only resolve here,
    ///   such as an unsupported relational driver.
    /// - [`ModuleError::Adapter`] when the store cannot be opened.
    /// - [`ModuleError::Policy`] for a malformed model or a failed load.
    pub async fn initialize(&self) -> ModuleResult<()> {
        let mut slot = self.engine.write().await;

        let model =
            ModelText::parse(&self.config.model).map_err(|e| self.policy_error("parse model", e))?;
        let adapter_config = self.config.adapter.resolve().map_err(|e| ModuleError::Config {
            module: self.name.clone(),
            source: ConfigError::Adapter(e),
        })?;
        let seed = SeedRows {
            policies: self.config.policies.clone(),
            groupings: self.config.role_assignments.clone(),
        };
        let adapter = build_adapter(&adapter_config, seed)
            .await
            .map_err(|source| ModuleError::Adapter {
                module: self.name.clone(),
                source,
            })?;
        let backend = adapter.backend_name();
        let engine = PolicyEngine::new(&model, adapter)
            .await
            .map_err(|e| self.policy_error("create enforcer", e))?;

        let replaced = slot.replace(engine).is_some();
        tracing::info!(module = %self.name, backend, replaced, "authz module initialized");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.engine.read().await.is_some()
    }

    /// Start the polling reloader.
    ///
    /// # What it does
    /// With a `polling` watcher, spawns a task that calls the equivalent of
    /// [`EnforcementModule::reload`] once per interval, first after one full
    /// interval. A failed reload is logged at `warn` and the loop continues.
    ///
    /// # Invariants
    /// - A no-op when no watcher is configured or the reloader already runs.
    /// - Each reload holds the exclusive lock, so decisions see the old or the
    ///   new rule set, never a mix.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime, since it spawns a task.
    ///
    /// # Example
    /// ```rust,no_run
    /// use castellan_authz::EnforcementModule;
    /// use serde_json::json;
    ///
    /// # async fn run(model: &str) -> Result<(), Box<dyn std::error::Error>> {
    /// let config = json!({"model": model, "watcher": {"type": "polling", "interval": "10s"}});
    /// let module = EnforcementModule::from_value("authz", &config)?;
    /// module.initialize().await?;
    /// module.start();
    /// assert!(module.is_running());
    /// module.stop().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn start(&self) {
        let WatcherConfig::Polling { interval } = self.config.watcher else {
            return;
        };
        let mut reloader = self.reloader.lock();
        if reloader.is_some() {
            return;
        }
        *reloader = Some(Reloader::spawn(
            self.name.clone(),
            interval,
            Arc::clone(&self.engine),
        ));
        tracing::info!(module = %self.name, ?interval, "policy reloader started");
    }

    /// Stop the polling reloader.
    ///
    /// # What it does
    /// Signals the reloader task and waits until it has exited, so no reload
    /// runs after this returns. A reload already in progress completes first.
    ///
    /// # Invariants
    /// - A no-op when the reloader was never started or is already stopped.
    /// - The engine stays initialized; decisions and mutations keep working.
    pub async fn stop(&self) {
        let reloader = self.reloader.lock().take();
        if let Some(reloader) = reloader {
            reloader.shutdown().await;
            tracing::info!(module = %self.name, "policy reloader stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.reloader.lock().is_some()
    }

    /// Reload every rule from the store.
    ///
    /// # What it does
    /// Replaces the in-memory rule set with the store's current contents under
    /// the exclusive lock. Picks up rows written to the store by other
    /// processes.
    ///
    /// # Invariants
    /// - In-memory changes whose save failed are discarded.
    ///
    /// # Errors
    /// - [`ModuleError::NotInitialized`] before a successful `initialize`.
    /// - [`ModuleError::Policy`] with op `reload` when the store cannot be read.
    pub async fn reload(&self) -> ModuleResult<()> {
        let mut slot = self.engine.write().await;
        let engine = slot.as_mut().ok_or_else(|| self.not_initialized())?;
        engine
            .load_all_rules()
            .await
            .map_err(|e| self.policy_error("reload", e))
    }

    /// Snapshot of the current rows of `kind`.
    pub async fn rules(&self, kind: RuleKind) -> ModuleResult<Vec<Vec<String>>> {
        let slot = self.engine.read().await;
        let engine = slot.as_ref().ok_or_else(|| self.not_initialized())?;
        Ok(engine.rules(kind))
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        kind: RuleKind,
        rule: Vec<String>,
    ) -> ModuleResult<bool> {
        let mut slot = self.engine.write().await;
        let engine = slot.as_mut().ok_or_else(|| self.not_initialized())?;

        let (op, result) = match mutation {
            Mutation::Add => ("add rule", engine.add_rule(kind, rule.clone()).await),
            Mutation::Remove => ("remove rule", engine.remove_rule(kind, rule.clone()).await),
        };
        let changed = result.map_err(|e| self.policy_error(op, e))?;
        if changed {
            engine
                .replace_all_rules()
                .await
                .map_err(|e| self.policy_error("save rules", e))?;
        }
        tracing::debug!(module = %self.name, op, %kind, ?rule, changed, "policy mutation");
        Ok(changed)
    }

    fn not_initialized(&self) -> ModuleError {
        ModuleError::NotInitialized {
            module: self.name.clone(),
        }
    }

    fn policy_error(&self, op: &'static str, source: PolicyError) -> ModuleError {
        ModuleError::Policy {
            module: self.name.clone(),
            op,
            source,
        }
    }
}

#[async_trait]
impl PolicyModule for EnforcementModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> ModuleResult<bool> {
        let slot = self.engine.read().await;
        let engine = slot.as_ref().ok_or_else(|| self.not_initialized())?;
        let allowed = engine
            .enforce(&AccessRequest::new(subject, object, action))
            .map_err(|e| self.policy_error("enforce", e))?;
        tracing::debug!(module = %self.name, subject, object, action, allowed, "authz decision");
        Ok(allowed)
    }

    async fn add_policy(&self, rule: Vec<String>) -> ModuleResult<bool> {
        self.mutate(Mutation::Add, RuleKind::Policy, rule).await
    }

    async fn remove_policy(&self, rule: Vec<String>) -> ModuleResult<bool> {
        self.mutate(Mutation::Remove, RuleKind::Policy, rule).await
    }

    async fn add_role_assignment(&self, assignment: Vec<String>) -> ModuleResult<bool> {
        self.mutate(Mutation::Add, RuleKind::Grouping, assignment)
            .await
    }

    async fn remove_role_assignment(&self, assignment: Vec<String>) -> ModuleResult<bool> {
        self.mutate(Mutation::Remove, RuleKind::Grouping, assignment)
            .await
    }
}
