//! `step.authz_role_assign`: add or remove `[member, role]` pairs.
use super::{
    ContextMap, ROLE_ASSIGN_STEP, Step, StepContext, StepOutcome, compile_row, config_error,
    lookup_module, module_name, parse_config, render_row, string_list,
};
use crate::errors::{ConfigError, StepError, StepResult};
use crate::registry::ModuleRegistry;
use crate::template::Templated;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleAction {
    #[default]
    Add,
    Remove,
}

impl RoleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleAction::Add => "add",
            RoleAction::Remove => "remove",
        }
    }
}

impl FromStr for RoleAction {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "" | "add" => Ok(RoleAction::Add),
            "remove" => Ok(RoleAction::Remove),
            other => Err(ConfigError::InvalidRoleAction(other.to_string())),
        }
    }
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoleAssignConfig {
    module: Option<String>,
    action: Option<String>,
    assignments: Option<Vec<Vec<String>>>,
}

pub struct RoleAssignStep {
    name: String,
    module: String,
    action: RoleAction,
    assignments: Vec<Vec<Templated>>,
    registry: ModuleRegistry,
}

impl RoleAssignStep {
    /// # Errors
    /// - `action` other than `add` or `remove`.
    /// - `assignments` missing or empty, or a pair with fewer than 2 fields.
    pub fn new(
        name: impl Into<String>,
        config: &Value,
        registry: ModuleRegistry,
    ) -> StepResult<Self> {
        let name = name.into();
        let raw: RoleAssignConfig = parse_config(ROLE_ASSIGN_STEP, &name, config)?;
        let fail = |source: ConfigError| config_error(ROLE_ASSIGN_STEP, &name, source);

        let action: RoleAction = raw.action.as_deref().unwrap_or_default().parse().map_err(fail)?;
        let assignments = raw
            .assignments
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| fail(ConfigError::MissingField("assignments")))?;
        if let Some(index) = assignments.iter().position(|row| row.len() < 2) {
            return Err(fail(ConfigError::ShortRow {
                field: "assignments",
                index,
                expected: "[user, role]",
                row: assignments[index].clone(),
            }));
        }

        Ok(Self {
            module: module_name(raw.module),
            action,
            assignments: assignments.iter().map(|row| compile_row(row)).collect(),
            registry,
            name,
        })
    }

    pub fn action(&self) -> RoleAction {
        self.action
    }
}

#[async_trait]
impl Step for RoleAssignStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step_type(&self) -> &'static str {
        ROLE_ASSIGN_STEP
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let data = ctx.template_data();
        let module = lookup_module(&self.registry, ROLE_ASSIGN_STEP, &self.name, &self.module)?;

        let mut processed = Vec::with_capacity(self.assignments.len());
        for (index, assignment) in self.assignments.iter().enumerate() {
            let pair = render_row(assignment, &data);
            let result = match self.action {
                RoleAction::Add => module.add_role_assignment(pair.clone()).await,
                RoleAction::Remove => module.remove_role_assignment(pair.clone()).await,
            };
            result.map_err(|source| StepError::Module {
                step_type: ROLE_ASSIGN_STEP,
                step: self.name.clone(),
                op: format!("{} assignment[{index}]", self.action),
                source,
            })?;
            processed.push(string_list(&pair));
        }

        let mut output = ContextMap::new();
        output.insert("authz_role_action".into(), Value::String(self.action.to_string()));
        output.insert("authz_role_assignments".into(), Value::Array(processed));
        Ok(StepOutcome::proceed(output))
    }
}
