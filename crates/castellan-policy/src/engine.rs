//! Matching engine built on a Casbin enforcer.
//!
//! # Purpose and responsibility
//! Owns the parsed model and the in-memory rule set, evaluates access requests
//! against them, and exposes the bulk load/replace and single-rule mutation
//! primitives the enforcement layer needs.
//!
//! # Key invariants and assumptions
//! - Store auto-save is disabled: [`PolicyEngine::add_rule`] and friends only
//!   touch memory. Callers persist with [`PolicyEngine::replace_all_rules`].
//! - Duplicate detection is Casbin's: adding an existing row reports `false`,
//!   removing a missing row reports `false`.
//! - [`PolicyEngine::enforce`] takes `&self` and may run concurrently with
//!   other readers.
use crate::{ModelText, PolicyError, PolicyResult, RuleKind};
use casbin::{Adapter, CoreApi, DefaultModel, Enforcer, MgmtApi};
use serde::{Deserialize, Serialize};

/// One access query: may `subject` perform `action` on `object`?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl AccessRequest {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

pub struct PolicyEngine {
    enforcer: Enforcer,
}

impl PolicyEngine {
    /// Parse `model`, attach `adapter`, and load every rule it holds.
    ///
    /// # Errors
    /// - [`PolicyError::Model`] when the grammar rejects the text.
    /// - [`PolicyError::Engine`] when the store fails to load.
    pub async fn new<A>(model: &ModelText, adapter: A) -> PolicyResult<Self>
    where
        A: Adapter + 'static,
    {
        let parsed = DefaultModel::from_str(model.as_str())
            .await
            .map_err(PolicyError::Model)?;
        let mut enforcer = Enforcer::new(parsed, adapter)
            .await
            .map_err(PolicyError::engine("load rules"))?;
        enforcer.enable_auto_save(false);
        Ok(Self { enforcer })
    }

    pub fn enforce(&self, request: &AccessRequest) -> PolicyResult<bool> {
        let allowed = self
            .enforcer
            .enforce((
                request.subject.as_str(),
                request.object.as_str(),
                request.action.as_str(),
            ))
            .map_err(PolicyError::engine("enforce"))?;
        tracing::trace!(
            subject = %request.subject,
            object = %request.object,
            action = %request.action,
            allowed,
            "policy decision"
        );
        Ok(allowed)
    }

    /// Replace the in-memory rule set with the store's contents.
    pub async fn load_all_rules(&mut self) -> PolicyResult<()> {
        self.enforcer
            .load_policy()
            .await
            .map_err(PolicyError::engine("load rules"))
    }

    /// Replace the store's contents with the in-memory rule set.
    pub async fn replace_all_rules(&mut self) -> PolicyResult<()> {
        self.enforcer
            .save_policy()
            .await
            .map_err(PolicyError::engine("save rules"))
    }

    /// Add one policy or grouping row to the in-memory rule set.
    ///
    /// # What it does
    /// Inserts `rule` into the `p` or `g` section chosen by `kind`. Grouping
    /// rows also update the role graph, so inherited permissions apply to the
    /// next [`PolicyEngine::enforce`] call.
    ///
    /// # Invariants
    /// - The store is not touched; persist with
    ///   [`PolicyEngine::replace_all_rules`].
    /// - Returns `false` when an equal row already exists.
    ///
    /// # Errors
    /// - [`PolicyError::Engine`] with op `add rule` when Casbin rejects the row.
    ///
    /// # Example
    /// ```rust
    /// use castellan_policy::{ModelText, PolicyEngine, PolicyResult, RuleKind};
    ///
    /// # async fn grant(model: &ModelText) -> PolicyResult<()> {
    /// let mut engine = PolicyEngine::new(model, casbin::MemoryAdapter::default()).await?;
    /// let row = vec!["alice".to_string(), "/api".to_string(), "GET".to_string()];
    /// assert!(engine.add_rule(RuleKind::Policy, row.clone()).await?);
    /// assert!(!engine.add_rule(RuleKind::Policy, row).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_rule(&mut self, kind: RuleKind, rule: Vec<String>) -> PolicyResult<bool> {
        let changed = match kind {
            RuleKind::Policy => self.enforcer.add_policy(rule).await,
            RuleKind::Grouping => self.enforcer.add_grouping_policy(rule).await,
        }
        .map_err(PolicyError::engine("add rule"))?;
        Ok(changed)
    }

    /// Remove one exactly matching row from the in-memory rule set.
    ///
    /// # What it does
    /// Deletes the `p` or `g` row equal to `rule`. Removing a grouping row
    /// drops the role link, and permissions inherited through it stop
    /// applying.
    ///
    /// # Invariants
    /// - The store is not touched; persist with
    ///   [`PolicyEngine::replace_all_rules`].
    /// - Returns `false` when no equal row exists.
    ///
    /// # Errors
    /// - [`PolicyError::Engine`] with op `remove rule` when Casbin fails.
    ///
    /// # Example
    /// ```rust
    /// use castellan_policy::{PolicyEngine, PolicyResult, RuleKind};
    ///
    /// # async fn revoke(engine: &mut PolicyEngine) -> PolicyResult<()> {
    /// let link = vec!["alice".to_string(), "admin".to_string()];
    /// if engine.remove_rule(RuleKind::Grouping, link).await? {
    ///     engine.replace_all_rules().await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn remove_rule(&mut self, kind: RuleKind, rule: Vec<String>) -> PolicyResult<bool> {
        let changed = match kind {
            RuleKind::Policy => self.enforcer.remove_policy(rule).await,
            RuleKind::Grouping => self.enforcer.remove_grouping_policy(rule).await,
        }
        .map_err(PolicyError::engine("remove rule"))?;
        Ok(changed)
    }

    pub async fn remove_filtered_rules(
        &mut self,
        kind: RuleKind,
        field_index: usize,
        field_values: Vec<String>,
    ) -> PolicyResult<bool> {
        let changed = match kind {
            RuleKind::Policy => {
                self.enforcer
                    .remove_filtered_policy(field_index, field_values)
                    .await
            }
            RuleKind::Grouping => {
                self.enforcer
                    .remove_filtered_grouping_policy(field_index, field_values)
                    .await
            }
        }
        .map_err(PolicyError::engine("remove filtered rules"))?;
        Ok(changed)
    }

    /// Current rows of `kind` under its default rule-kind name.
    pub fn rules(&self, kind: RuleKind) -> Vec<Vec<String>> {
        match kind {
            RuleKind::Policy => self.enforcer.get_policy(),
            RuleKind::Grouping => self.enforcer.get_grouping_policy(),
        }
    }
}
