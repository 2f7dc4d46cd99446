//! `step.authz_add_policy` and `step.authz_remove_policy`.
use super::{
    ADD_POLICY_STEP, ContextMap, REMOVE_POLICY_STEP, Step, StepContext, StepOutcome, compile_row,
    config_error, lookup_module, module_name, parse_config, render_row, string_list,
};
use crate::errors::{ConfigError, StepError, StepResult};
use crate::registry::ModuleRegistry;
use crate::template::Templated;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChange {
    Add,
    Remove,
}

impl PolicyChange {
    pub fn step_type(self) -> &'static str {
        match self {
            PolicyChange::Add => ADD_POLICY_STEP,
            PolicyChange::Remove => REMOVE_POLICY_STEP,
        }
    }

    fn output_key(self) -> &'static str {
        match self {
            PolicyChange::Add => "authz_policy_added",
            PolicyChange::Remove => "authz_policy_removed",
        }
    }

    fn op(self) -> &'static str {
        match self {
            PolicyChange::Add => "add policy",
            PolicyChange::Remove => "remove policy",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyConfig {
    module: Option<String>,
    rule: Option<Vec<String>>,
}

pub struct PolicyStep {
    name: String,
    change: PolicyChange,
    module: String,
    rule: Vec<Templated>,
    registry: ModuleRegistry,
}

impl PolicyStep {
    /// # Errors
    /// - `rule` missing, not a list of strings, or empty.
    pub fn new(
        name: impl Into<String>,
        change: PolicyChange,
        config: &Value,
        registry: ModuleRegistry,
    ) -> StepResult<Self> {
        let name = name.into();
        let step_type = change.step_type();
        let raw: PolicyConfig = parse_config(step_type, &name, config)?;
        let rule = raw
            .rule
            .ok_or_else(|| config_error(step_type, &name, ConfigError::MissingField("rule")))?;
        if rule.is_empty() {
            return Err(config_error(
                step_type,
                &name,
                ConfigError::EmptyList { field: "rule" },
            ));
        }
        Ok(Self {
            change,
            module: module_name(raw.module),
            rule: compile_row(&rule),
            registry,
            name,
        })
    }

    pub fn add(name: impl Into<String>, config: &Value, registry: ModuleRegistry) -> StepResult<Self> {
        Self::new(name, PolicyChange::Add, config, registry)
    }

    pub fn remove(
        name: impl Into<String>,
        config: &Value,
        registry: ModuleRegistry,
    ) -> StepResult<Self> {
        Self::new(name, PolicyChange::Remove, config, registry)
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}

#[async_trait]
impl Step for PolicyStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step_type(&self) -> &'static str {
        self.change.step_type()
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let step_type = self.change.step_type();
        let rule = render_row(&self.rule, &ctx.template_data());
        let module = lookup_module(&self.registry, step_type, &self.name, &self.module)?;

        let result = match self.change {
            PolicyChange::Add => module.add_policy(rule.clone()).await,
            PolicyChange::Remove => module.remove_policy(rule.clone()).await,
        };
        let changed = result.map_err(|source| StepError::Module {
            step_type,
            step: self.name.clone(),
            op: self.change.op().into(),
            source,
        })?;

        let mut output = ContextMap::new();
        output.insert(self.change.output_key().into(), Value::Bool(changed));
        output.insert("authz_rule".into(), string_list(&rule));
        Ok(StepOutcome::proceed(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{SpyModule, current, registry_with};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn add_renders_rule_and_reports_change() {
        let spy = Arc::new(SpyModule::named("authz"));
        let step = PolicyStep::add(
            "grant",
            &json!({"rule": ["{{.role}}", "/api/{{.resource}}", "GET"]}),
            registry_with(Arc::clone(&spy)),
        )
        .expect("step");

        let outcome = step
            .execute(&current(json!({"role": "editor", "resource": "drafts"})))
            .await
            .expect("execute");
        assert!(!outcome.stop_pipeline);
        assert_eq!(outcome.output["authz_policy_added"], true);
        assert_eq!(outcome.output["authz_rule"], json!(["editor", "/api/drafts", "GET"]));
        assert_eq!(spy.calls(), vec!["add_policy editor,/api/drafts,GET"]);
    }

    #[tokio::test]
    async fn remove_uses_remove_key() {
        let spy = Arc::new(SpyModule::named("tenant"));
        let step = PolicyStep::remove(
            "revoke",
            &json!({"module": "tenant", "rule": ["admin", "/api", "*"]}),
            registry_with(Arc::clone(&spy)),
        )
        .expect("step");
        assert_eq!(step.step_type(), REMOVE_POLICY_STEP);

        let outcome = step.execute(&StepContext::default()).await.expect("execute");
        assert_eq!(outcome.output["authz_policy_removed"], true);
        assert!(!outcome.output.contains_key("authz_policy_added"));
        assert_eq!(spy.calls(), vec!["remove_policy admin,/api,*"]);
    }

    #[tokio::test]
    async fn broken_template_element_is_literal() {
        let spy = Arc::new(SpyModule::named("authz"));
        let step = PolicyStep::add(
            "grant",
            &json!({"rule": ["{{ upper .role }}", "/api", "GET"]}),
            registry_with(Arc::clone(&spy)),
        )
        .expect("step");
        let outcome = step.execute(&StepContext::default()).await.expect("execute");
        assert_eq!(outcome.output["authz_rule"][0], "{{ upper .role }}");
    }

    #[tokio::test]
    async fn unknown_module() {
        let step = PolicyStep::add(
            "grant",
            &json!({"module": "missing", "rule": ["a", "b", "c"]}),
            ModuleRegistry::new(),
        )
        .expect("step");
        assert!(matches!(
            step.execute(&StepContext::default()).await,
            Err(StepError::ModuleNotFound { step_type: ADD_POLICY_STEP, .. })
        ));
    }

    #[test]
    fn rule_required_and_non_empty() {
        for config in [json!({}), json!({"rule": []}), json!({"rule": "admin"})] {
            assert!(matches!(
                PolicyStep::remove("revoke", &config, ModuleRegistry::new()),
                Err(StepError::Config { step_type: REMOVE_POLICY_STEP, .. })
            ));
        }
    }
}
