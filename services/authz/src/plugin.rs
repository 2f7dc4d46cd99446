//! Plugin surface toward a hosting pipeline engine.
//!
//! # Purpose
//! [`AuthzPlugin`] builds `authz.casbin` modules and the four authz steps by
//! type name. Modules it creates are registered in its own
//! [`ModuleRegistry`]; steps it creates look modules up in that same
//! registry at execution time.
use crate::audit::{AuditSink, TracingAuditSink};
use crate::errors::PluginError;
use crate::module::{EnforcementModule, MODULE_TYPE, PolicyModule};
use crate::registry::ModuleRegistry;
use crate::steps::{
    ADD_POLICY_STEP, AuthzCheckStep, CHECK_STEP, PolicyStep, REMOVE_POLICY_STEP, ROLE_ASSIGN_STEP,
    RoleAssignStep, STEP_TYPES, Step,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "castellan-authz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginManifest {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub module_types: Vec<&'static str>,
    pub step_types: Vec<&'static str>,
}

#[derive(Clone)]
pub struct AuthzPlugin {
    registry: ModuleRegistry,
    sink: Arc<dyn AuditSink>,
}

impl Default for AuthzPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthzPlugin {
    pub fn new() -> Self {
        Self::with_audit_sink(Arc::new(TracingAuditSink))
    }

    pub fn with_audit_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            registry: ModuleRegistry::new(),
            sink,
        }
    }

    pub fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: PLUGIN_NAME,
            version: env!("CARGO_PKG_VERSION"),
            description: "RBAC authorization backed by Casbin policy models",
            module_types: self.module_types().to_vec(),
            step_types: self.step_types().to_vec(),
        }
    }

    pub fn module_types(&self) -> &'static [&'static str] {
        &[MODULE_TYPE]
    }

    pub fn step_types(&self) -> &'static [&'static str] {
        &STEP_TYPES
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Build a module and register it under `name`. The module is returned
    /// uninitialized; the host drives `initialize`, `start` and `stop`.
    pub fn create_module(
        &self,
        type_name: &str,
        name: &str,
        config: &Value,
    ) -> Result<Arc<EnforcementModule>, PluginError> {
        if type_name != MODULE_TYPE {
            return Err(PluginError::UnknownType {
                kind: "module",
                type_name: type_name.to_string(),
            });
        }
        let module = Arc::new(EnforcementModule::from_value(name, config)?);
        self.registry
            .register(Arc::clone(&module) as Arc<dyn PolicyModule>);
        tracing::debug!(module = name, "authz module registered");
        Ok(module)
    }

    pub fn create_step(
        &self,
        type_name: &str,
        name: &str,
        config: &Value,
    ) -> Result<Box<dyn Step>, PluginError> {
        let registry = self.registry.clone();
        let step: Box<dyn Step> = match type_name {
            CHECK_STEP => Box::new(AuthzCheckStep::new(
                name,
                config,
                registry,
                Arc::clone(&self.sink),
            )?),
            ADD_POLICY_STEP => Box::new(PolicyStep::add(name, config, registry)?),
            REMOVE_POLICY_STEP => Box::new(PolicyStep::remove(name, config, registry)?),
            ROLE_ASSIGN_STEP => Box::new(RoleAssignStep::new(name, config, registry)?),
            other => {
                return Err(PluginError::UnknownType {
                    kind: "step",
                    type_name: other.to_string(),
                });
            }
        };
        Ok(step)
    }
}
