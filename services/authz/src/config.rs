//! Module configuration.
//!
//! # Purpose
//! Turns the host's configuration mapping (`model`, `policies`,
//! `roleAssignments`, `adapter`, `watcher`) into a validated
//! [`ModuleConfig`]. Everything here is checked without I/O; the
//! driver-dependent parts of the adapter are resolved again at
//! initialization, where an unsupported driver surfaces.
use crate::errors::ConfigError;
use castellan_adapter::{AdapterKind, AdapterSpec};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub model: String,
    pub policies: Vec<Vec<String>>,
    pub role_assignments: Vec<Vec<String>>,
    pub adapter: AdapterSpec,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherConfig {
    #[default]
    None,
    Polling {
        interval: Duration,
    },
}

impl WatcherConfig {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            WatcherConfig::None => None,
            WatcherConfig::Polling { interval } => Some(*interval),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawModuleConfig {
    model: Option<String>,
    policies: Vec<Vec<String>>,
    #[serde(rename = "roleAssignments", alias = "role_assignments")]
    role_assignments: Vec<Vec<String>>,
    adapter: AdapterSpec,
    watcher: RawWatcher,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWatcher {
    #[serde(rename = "type")]
    kind: Option<String>,
    interval: Option<String>,
}

impl ModuleConfig {
    /// Parse and validate a module configuration mapping. `null` is treated
    /// as an empty mapping.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let raw: RawModuleConfig = if value.is_null() {
            RawModuleConfig::default()
        } else {
            serde_json::from_value(value.clone())?
        };
        raw.validate()
    }

    /// A memory-backed configuration with no seed rows or watcher.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            policies: Vec::new(),
            role_assignments: Vec::new(),
            adapter: AdapterSpec::default(),
            watcher: WatcherConfig::None,
        }
    }

    /// Re-run the construction-time checks on a programmatically built config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        check_rows("policies", &self.policies, 3, "[sub, obj, act]")?;
        check_rows("roleAssignments", &self.role_assignments, 2, "[user, role]")?;
        check_adapter(&self.adapter)
    }
}

impl RawModuleConfig {
    fn validate(self) -> Result<ModuleConfig, ConfigError> {
        let config = ModuleConfig {
            model: self.model.unwrap_or_default(),
            policies: self.policies,
            role_assignments: self.role_assignments,
            adapter: self.adapter,
            watcher: self.watcher.resolve()?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl RawWatcher {
    fn resolve(self) -> Result<WatcherConfig, ConfigError> {
        let kind = self.kind.unwrap_or_default().trim().to_ascii_lowercase();
        match kind.as_str() {
            "" | "none" => Ok(WatcherConfig::None),
            "polling" => {
                let interval = match self.interval.as_deref().map(str::trim) {
                    None | Some("") => DEFAULT_POLL_INTERVAL,
                    Some(text) => parse_duration(text)
                        .filter(|d| !d.is_zero())
                        .ok_or_else(|| ConfigError::InvalidInterval(text.to_string()))?,
                };
                Ok(WatcherConfig::Polling { interval })
            }
            _ => Err(ConfigError::UnknownWatcher(kind)),
        }
    }
}

fn check_rows(
    field: &'static str,
    rows: &[Vec<String>],
    min: usize,
    expected: &'static str,
) -> Result<(), ConfigError> {
    match rows.iter().position(|row| row.len() < min) {
        Some(index) => Err(ConfigError::ShortRow {
            field,
            index,
            expected,
            row: rows[index].clone(),
        }),
        None => Ok(()),
    }
}

fn check_adapter(spec: &AdapterSpec) -> Result<(), ConfigError> {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    match spec.kind()? {
        AdapterKind::Memory => Ok(()),
        AdapterKind::File if !present(&spec.path) => Err(ConfigError::MissingField("adapter.path")),
        AdapterKind::Relational if !present(&spec.dsn) => {
            Err(ConfigError::MissingField("adapter.dsn"))
        }
        _ => Ok(()),
    }
}

/// Parse a duration such as `30s`, `250ms`, `1.5h` or `1m30s`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text == "0" {
        return Some(Duration::ZERO);
    }
    if text.is_empty() || text.starts_with('-') {
        return None;
    }
    let mut rest = text.strip_prefix('+').unwrap_or(text);
    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }
    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_adapter::AdapterError;
    use serde_json::json;

    const MODEL: &str = "[request_definition]\nr = sub, obj, act\n\n[policy_definition]\np = sub, obj, act\n\n[policy_effect]\ne = some(where (p.eft == allow))\n\n[matchers]\nm = r.sub == p.sub && r.obj == p.obj && r.act == p.act\n";

    #[test]
    fn parses_full_mapping() {
        let config = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "policies": [["admin", "/api", "GET"]],
            "roleAssignments": [["alice", "admin"]],
            "adapter": {"type": "gorm", "driver": "sqlite3", "dsn": ":memory:"},
            "watcher": {"type": "polling", "interval": "1m30s"},
        }))
        .expect("config");

        assert_eq!(config.policies.len(), 1);
        assert_eq!(config.role_assignments, vec![vec!["alice", "admin"]]);
        assert_eq!(config.adapter.kind().expect("kind"), AdapterKind::Relational);
        assert_eq!(config.watcher.interval(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn model_is_required() {
        assert!(matches!(
            ModuleConfig::from_value(&json!({})),
            Err(ConfigError::MissingModel)
        ));
        assert!(matches!(
            ModuleConfig::from_value(&json!({"model": "   "})),
            Err(ConfigError::MissingModel)
        ));
        assert!(matches!(
            ModuleConfig::from_value(&Value::Null),
            Err(ConfigError::MissingModel)
        ));
    }

    #[test]
    fn short_rows_rejected() {
        let err = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "policies": [["admin", "/api", "GET"], ["admin", "/api"]],
        }))
        .expect_err("short policy");
        assert!(matches!(err, ConfigError::ShortRow { field: "policies", index: 1, .. }));

        let err = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "roleAssignments": [["alice"]],
        }))
        .expect_err("short assignment");
        assert!(matches!(err, ConfigError::ShortRow { field: "roleAssignments", index: 0, .. }));
    }

    #[test]
    fn non_string_row_is_malformed() {
        let err = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "policies": [["admin", 7, "GET"]],
        }))
        .expect_err("bad element");
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn adapter_fields_checked_at_construction() {
        let err = ModuleConfig::from_value(&json!({"model": MODEL, "adapter": {"type": "file"}}))
            .expect_err("path");
        assert!(matches!(err, ConfigError::MissingField("adapter.path")));

        let err = ModuleConfig::from_value(&json!({"model": MODEL, "adapter": {"type": "relational"}}))
            .expect_err("dsn");
        assert!(matches!(err, ConfigError::MissingField("adapter.dsn")));

        let err = ModuleConfig::from_value(&json!({"model": MODEL, "adapter": {"type": "redis"}}))
            .expect_err("type");
        assert!(matches!(err, ConfigError::Adapter(AdapterError::UnknownType(_))));
    }

    #[test]
    fn unsupported_driver_passes_construction() {
        let config = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "adapter": {"type": "relational", "driver": "oracle", "dsn": "x"},
        }))
        .expect("driver is checked at initialization");
        assert!(config.adapter.resolve().is_err());
    }

    #[test]
    fn watcher_defaults_and_errors() {
        let none = ModuleConfig::from_value(&json!({"model": MODEL})).expect("config");
        assert_eq!(none.watcher, WatcherConfig::None);

        let polling = ModuleConfig::from_value(&json!({"model": MODEL, "watcher": {"type": "polling"}}))
            .expect("config");
        assert_eq!(polling.watcher.interval(), Some(DEFAULT_POLL_INTERVAL));

        let err = ModuleConfig::from_value(&json!({"model": MODEL, "watcher": {"type": "inotify"}}))
            .expect_err("type");
        assert!(matches!(err, ConfigError::UnknownWatcher(kind) if kind == "inotify"));

        let err = ModuleConfig::from_value(&json!({
            "model": MODEL,
            "watcher": {"type": "polling", "interval": "soon"},
        }))
        .expect_err("interval");
        assert!(matches!(err, ConfigError::InvalidInterval(text) if text == "soon"));
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("30ms"), Some(Duration::from_millis(30)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("1h2m3s"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration(""), None);
    }
}
