//! Error taxonomy for modules and steps.
//!
//! Access denial is not an error: the check step reports it as a terminal
//! [`crate::steps::StepOutcome`]. Everything here is a failure carrying the
//! component name and the operation that failed.
use castellan_adapter::AdapterError;
use castellan_policy::PolicyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not a valid mapping: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("config.model is required")]
    MissingModel,
    #[error("config.{0} is required")]
    MissingField(&'static str),
    #[error("config.{field} must not be empty")]
    EmptyList { field: &'static str },
    #[error("config.{field}[{index}]: expected {expected}, got {row:?}")]
    ShortRow {
        field: &'static str,
        index: usize,
        expected: &'static str,
        row: Vec<String>,
    },
    #[error("config.adapter: {0}")]
    Adapter(#[from] AdapterError),
    #[error("config.watcher.type: unknown watcher type {0:?} (supported: none, polling)")]
    UnknownWatcher(String),
    #[error("config.watcher.interval: invalid duration {0:?}")]
    InvalidInterval(String),
    #[error("config.action must be \"add\" or \"remove\", got {0:?}")]
    InvalidRoleAction(String),
    #[error("config.{field}: {source}")]
    Template {
        field: String,
        #[source]
        source: TemplateError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),
    #[error("unsupported action {0:?}: expected a field reference such as {{{{.key}}}}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("authz.casbin {module:?}: {source}")]
    Config {
        module: String,
        #[source]
        source: ConfigError,
    },
    #[error("authz.casbin {module:?}: build adapter: {source}")]
    Adapter {
        module: String,
        #[source]
        source: AdapterError,
    },
    #[error("authz.casbin {module:?}: {op}: {source}")]
    Policy {
        module: String,
        op: &'static str,
        #[source]
        source: PolicyError,
    },
    #[error("authz.casbin {module:?}: enforcer not initialized")]
    NotInitialized { module: String },
}

impl ModuleError {
    /// True for failures detected from configuration alone.
    pub fn is_config(&self) -> bool {
        matches!(self, ModuleError::Config { .. })
    }
}

pub type ModuleResult<T> = Result<T, ModuleError>;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("{step_type} {step:?}: {source}")]
    Config {
        step_type: &'static str,
        step: String,
        #[source]
        source: ConfigError,
    },
    #[error("{step_type} {step:?}: authz module {module:?} not found; check module name in config")]
    ModuleNotFound {
        step_type: &'static str,
        step: String,
        module: String,
    },
    #[error("{step_type} {step:?}: {op}: {source}")]
    Module {
        step_type: &'static str,
        step: String,
        op: String,
        #[source]
        source: ModuleError,
    },
}

pub type StepResult<T> = Result<T, StepError>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("authz plugin: unknown {kind} type {type_name:?}")]
    UnknownType {
        kind: &'static str,
        type_name: String,
    },
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Step(#[from] StepError),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("read host config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse host config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("host config: duplicate module name {0:?}")]
    DuplicateModule(String),
    #[error("host config: module {0:?} is not defined")]
    UnknownModule(String),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Module(#[from] ModuleError),
}
