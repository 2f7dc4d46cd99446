//! Castellan authz: RBAC decisions for pipeline hosts.
//!
//! # Purpose
//! Wraps the policy engine and stores in an [`EnforcementModule`] that many
//! requests can query while others mutate the rule set, and exposes decision
//! and administration steps a pipeline host can run.
//!
//! # How it fits
//! - [`AuthzPlugin`] builds modules (`authz.casbin`) and steps
//!   (`step.authz_check`, `step.authz_add_policy`, `step.authz_remove_policy`,
//!   `step.authz_role_assign`) from configuration mappings.
//! - Modules are registered in the plugin's [`ModuleRegistry`]; steps find
//!   them there by name when they execute.
//! - The `authz` binary loads a [`host::HostConfig`] YAML file and answers
//!   single decisions from the command line.
//!
//! # Example
//! ```no_run
//! use castellan_authz::{AuthzPlugin, StepContext};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let plugin = AuthzPlugin::new();
//! let module = plugin.create_module("authz.casbin", "authz", &json!({
//!     "model": std::fs::read_to_string("rbac_model.conf")?,
//!     "policies": [["admin", "/api/posts", "GET"]],
//!     "roleAssignments": [["alice", "admin"]],
//! }))?;
//! module.initialize().await?;
//!
//! let check = plugin.create_step("step.authz_check", "check", &json!({
//!     "object": "{{.request_path}}",
//!     "action": "GET",
//! }))?;
//! let mut ctx = StepContext::default();
//! ctx.current.insert("auth_user_id".into(), json!("alice"));
//! ctx.current.insert("request_path".into(), json!("/api/posts"));
//! let outcome = check.execute(&ctx).await?;
//! assert!(!outcome.stop_pipeline);
//! # Ok(())
//! # }
//! ```
pub mod audit;
pub mod config;
pub mod errors;
pub mod host;
pub mod module;
pub mod observability;
pub mod plugin;
pub mod registry;
mod reload;
pub mod steps;
pub mod template;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::{ModuleConfig, WatcherConfig};
pub use errors::{ConfigError, ModuleError, PluginError, StepError, TemplateError};
pub use module::{EnforcementModule, MODULE_TYPE, PolicyModule};
pub use plugin::{AuthzPlugin, PluginManifest};
pub use registry::ModuleRegistry;
pub use steps::{Step, StepContext, StepOutcome};
pub use template::Templated;
