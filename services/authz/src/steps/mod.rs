//! Pipeline steps layered over a [`PolicyModule`].
//!
//! # Purpose
//! Steps are stateless per invocation. Each one reads three context sources
//! the host hands it (trigger data, prior step outputs, the current merged
//! context), resolves its templated parameters, calls a module looked up by
//! name in the [`ModuleRegistry`], and returns a [`StepOutcome`].
//!
//! # Key invariants
//! - Configuration is validated and templates compiled when the step is
//!   built, never at execution.
//! - An unknown module name is an execution error, not a denial.
//! - Template data shadows in the order trigger < prior outputs < current.
//!   Prior outputs are unordered, so two steps writing the same key race.
mod check;
mod policy;
mod role_assign;

pub use check::{AuthzCheckStep, DEFAULT_SUBJECT_KEY};
pub use policy::{PolicyChange, PolicyStep};
pub use role_assign::{RoleAction, RoleAssignStep};

use crate::errors::{ConfigError, StepError, StepResult};
use crate::module::PolicyModule;
use crate::registry::ModuleRegistry;
use crate::template::Templated;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const CHECK_STEP: &str = "step.authz_check";
pub const ADD_POLICY_STEP: &str = "step.authz_add_policy";
pub const REMOVE_POLICY_STEP: &str = "step.authz_remove_policy";
pub const ROLE_ASSIGN_STEP: &str = "step.authz_role_assign";

pub const STEP_TYPES: [&str; 4] = [CHECK_STEP, ADD_POLICY_STEP, REMOVE_POLICY_STEP, ROLE_ASSIGN_STEP];

pub const DEFAULT_MODULE: &str = "authz";

pub type ContextMap = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub trigger: ContextMap,
    pub outputs: HashMap<String, ContextMap>,
    pub current: ContextMap,
}

impl StepContext {
    pub fn new(trigger: ContextMap, outputs: HashMap<String, ContextMap>, current: ContextMap) -> Self {
        Self {
            trigger,
            outputs,
            current,
        }
    }

    /// Flatten the three sources into one mapping for template rendering.
    pub fn template_data(&self) -> Value {
        let mut data = self.trigger.clone();
        for output in self.outputs.values() {
            data.extend(output.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        data.extend(self.current.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(data)
    }

    /// First non-empty string under `key`: prior outputs, then current, then
    /// trigger data.
    pub fn find_string(&self, key: &str) -> Option<String> {
        let non_empty = |map: &ContextMap| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        self.outputs
            .values()
            .find_map(non_empty)
            .or_else(|| non_empty(&self.current))
            .or_else(|| non_empty(&self.trigger))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub output: ContextMap,
    /// Ask the host to skip the remaining steps.
    pub stop_pipeline: bool,
}

impl StepOutcome {
    pub fn proceed(output: ContextMap) -> Self {
        Self {
            output,
            stop_pipeline: false,
        }
    }

    pub fn halt(output: ContextMap) -> Self {
        Self {
            output,
            stop_pipeline: true,
        }
    }
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn step_type(&self) -> &'static str;

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutcome>;
}

/// Parse a step's configuration mapping; `null` reads as empty.
fn parse_config<T>(step_type: &'static str, step: &str, config: &Value) -> StepResult<T>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| StepError::Config {
        step_type,
        step: step.to_string(),
        source: ConfigError::Malformed(e),
    })
}

fn config_error(step_type: &'static str, step: &str, source: ConfigError) -> StepError {
    StepError::Config {
        step_type,
        step: step.to_string(),
        source,
    }
}

fn module_name(configured: Option<String>) -> String {
    configured
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MODULE.to_string())
}

/// Shared lookup with the error every step reports for an unknown name.
fn lookup_module(
    registry: &ModuleRegistry,
    step_type: &'static str,
    step: &str,
    module: &str,
) -> StepResult<Arc<dyn PolicyModule>> {
    registry.get(module).ok_or_else(|| StepError::ModuleNotFound {
        step_type,
        step: step.to_string(),
        module: module.to_string(),
    })
}

/// Compile every element; elements that fail to compile stay literal.
fn compile_row(row: &[String]) -> Vec<Templated> {
    row.iter().map(|v| Templated::compile_or_literal(v)).collect()
}

fn render_row(row: &[Templated], data: &Value) -> Vec<String> {
    row.iter().map(|v| v.render(data)).collect()
}

fn string_list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}
