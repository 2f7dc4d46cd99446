//! `step.authz_check`: allow or stop the pipeline.
use super::{
    CHECK_STEP, ContextMap, Step, StepContext, StepOutcome, config_error, lookup_module,
    module_name, parse_config,
};
use crate::audit::{AuditRecord, AuditSink};
use crate::errors::{ConfigError, StepError, StepResult};
use crate::registry::ModuleRegistry;
use crate::template::Templated;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DEFAULT_SUBJECT_KEY: &str = "auth_user_id";

const MISSING_SUBJECT: &str =
    "missing authentication subject; ensure an authentication step runs first";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckConfig {
    module: Option<String>,
    subject_key: Option<String>,
    object: Option<String>,
    action: Option<String>,
    audit: bool,
}

pub struct AuthzCheckStep {
    name: String,
    module: String,
    subject_key: String,
    object: Templated,
    action: Templated,
    audit: bool,
    registry: ModuleRegistry,
    sink: Arc<dyn AuditSink>,
}

impl AuthzCheckStep {
    /// # Errors
    /// - `object` or `action` missing, blank, or an invalid template.
    pub fn new(
        name: impl Into<String>,
        config: &Value,
        registry: ModuleRegistry,
        sink: Arc<dyn AuditSink>,
    ) -> StepResult<Self> {
        let name = name.into();
        let raw: CheckConfig = parse_config(CHECK_STEP, &name, config)?;

        let required = |field: &'static str, value: Option<String>| -> StepResult<Templated> {
            let value = value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| config_error(CHECK_STEP, &name, ConfigError::MissingField(field)))?;
            Templated::compile(&value).map_err(|source| {
                config_error(
                    CHECK_STEP,
                    &name,
                    ConfigError::Template {
                        field: field.to_string(),
                        source,
                    },
                )
            })
        };
        let object = required("object", raw.object)?;
        let action = required("action", raw.action)?;

        Ok(Self {
            module: module_name(raw.module),
            subject_key: raw
                .subject_key
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_SUBJECT_KEY.to_string()),
            object,
            action,
            audit: raw.audit,
            registry,
            sink,
            name,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn subject_key(&self) -> &str {
        &self.subject_key
    }

    fn record_audit(
        &self,
        output: &mut ContextMap,
        subject: &str,
        object: &str,
        action: &str,
        allowed: bool,
    ) {
        if !self.audit {
            return;
        }
        let record = AuditRecord::decision(&self.module, subject, object, action, allowed);
        self.sink.record(&record);
        output.insert("audit_event".into(), record.to_value());
    }
}

fn forbidden(message: &str) -> ContextMap {
    let mut output = ContextMap::new();
    output.insert("response_status".into(), json!(403));
    output.insert(
        "response_body".into(),
        Value::String(json!({ "error": message }).to_string()),
    );
    output.insert(
        "response_headers".into(),
        json!({ "Content-Type": "application/json" }),
    );
    output.insert("authz_allowed".into(), Value::Bool(false));
    output
}

#[async_trait]
impl Step for AuthzCheckStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn step_type(&self) -> &'static str {
        CHECK_STEP
    }

    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutcome> {
        let data = ctx.template_data();
        let object = self.object.render(&data);
        let action = self.action.render(&data);

        let Some(subject) = ctx.find_string(&self.subject_key) else {
            tracing::debug!(step = %self.name, key = %self.subject_key, "no subject in context");
            let mut output = forbidden(MISSING_SUBJECT);
            self.record_audit(&mut output, "", &object, &action, false);
            return Ok(StepOutcome::halt(output));
        };

        let module = lookup_module(&self.registry, CHECK_STEP, &self.name, &self.module)?;
        let allowed = module
            .enforce(&subject, &object, &action)
            .await
            .map_err(|source| StepError::Module {
                step_type: CHECK_STEP,
                step: self.name.clone(),
                op: "enforce".into(),
                source,
            })?;

        if !allowed {
            let message = format!("forbidden: {subject} is not permitted to {action} {object}");
            let mut output = forbidden(&message);
            self.record_audit(&mut output, &subject, &object, &action, false);
            return Ok(StepOutcome::halt(output));
        }

        let mut output = ContextMap::new();
        output.insert("authz_subject".into(), Value::String(subject.clone()));
        output.insert("authz_object".into(), Value::String(object.clone()));
        output.insert("authz_action".into(), Value::String(action.clone()));
        output.insert("authz_allowed".into(), Value::Bool(true));
        self.record_audit(&mut output, &subject, &object, &action, true);
        Ok(StepOutcome::proceed(output))
    }
}
