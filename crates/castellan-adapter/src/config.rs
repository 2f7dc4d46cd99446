//! Adapter configuration: the raw `adapter` mapping and its validated form.
//!
//! # Purpose
//! [`AdapterSpec`] mirrors the configuration keys (`type`, `path`, `driver`,
//! `dsn`, `table_name`). The adapter type is checked when the owning module is
//! constructed; the variant-specific fields are checked by
//! [`AdapterSpec::resolve`], which runs right before the store is built.
use crate::{AdapterError, AdapterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

const MAX_TABLE_NAME_LEN: usize = 63;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Memory,
    File,
    Relational,
}

impl FromStr for AdapterKind {
    type Err = AdapterError;

    fn from_str(value: &str) -> AdapterResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(AdapterKind::Memory),
            "file" => Ok(AdapterKind::File),
            // `gorm` is the historical name of the relational store.
            "relational" | "gorm" => Ok(AdapterKind::Relational),
            _ => Err(AdapterError::UnknownType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Postgres,
    MySql,
    Sqlite,
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::Sqlite => "sqlite3",
        }
    }

    /// Turn a configured DSN into a URL the `sqlx` any-driver accepts.
    ///
    /// URLs with the driver's own scheme pass through unchanged. Postgres also
    /// accepts libpq `key=value` strings and MySQL the
    /// `user:pass@tcp(host:port)/db` form; both are rewritten as URLs.
    /// SQLite accepts `:memory:`, a bare path (created when missing), or a
    /// `sqlite:` URL.
    pub fn connection_url(self, dsn: &str) -> AdapterResult<String> {
        let dsn = dsn.trim();
        match self {
            Driver::Postgres => {
                if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
                    Ok(dsn.to_string())
                } else {
                    crate::dsn::postgres_url(dsn)
                }
            }
            Driver::MySql => {
                if dsn.starts_with("mysql://") || dsn.starts_with("mariadb://") {
                    Ok(dsn.to_string())
                } else {
                    crate::dsn::mysql_url(dsn)
                }
            }
            Driver::Sqlite => {
                if dsn == ":memory:" {
                    Ok("sqlite::memory:".to_string())
                } else if dsn.starts_with("sqlite:") {
                    Ok(dsn.to_string())
                } else if dsn.contains('?') {
                    Ok(format!("sqlite://{dsn}&mode=rwc"))
                } else {
                    Ok(format!("sqlite://{dsn}?mode=rwc"))
                }
            }
        }
    }

    /// Width of the `ptype` and `v0..v5` columns.
    ///
    /// MySQL gets narrower columns because InnoDB caps a composite index key
    /// at 3072 bytes and the unique index spans all seven columns. Longer
    /// values are rejected (strict mode) or truncated by the server.
    pub fn value_width(self) -> usize {
        match self {
            Driver::MySql => 128,
            Driver::Postgres | Driver::Sqlite => 512,
        }
    }

    pub fn is_in_memory(self, url: &str) -> bool {
        self == Driver::Sqlite && (url.contains(":memory:") || url.contains("mode=memory"))
    }
}

impl FromStr for Driver {
    type Err = AdapterError;

    fn from_str(value: &str) -> AdapterResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" => Ok(Driver::MySql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            _ => Err(AdapterError::UnsupportedDriver(value.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated relational store settings.
///
/// Rule values longer than [`Driver::value_width`] do not fit the table:
/// 512 characters on Postgres and SQLite, 128 on MySQL.
#[derive(Clone, PartialEq, Eq)]
pub struct RelationalConfig {
    pub driver: Driver,
    pub dsn: String,
    pub table_name: String,
}

// The DSN may carry credentials.
impl fmt::Debug for RelationalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalConfig")
            .field("driver", &self.driver)
            .field("dsn", &"<redacted>")
            .field("table_name", &self.table_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterConfig {
    Memory,
    File { path: PathBuf },
    Relational(RelationalConfig),
}

impl AdapterSpec {
    pub fn kind(&self) -> AdapterResult<AdapterKind> {
        self.kind.as_deref().unwrap_or_default().parse()
    }

    /// Validate the variant-specific fields. Performs no I/O.
    pub fn resolve(&self) -> AdapterResult<AdapterConfig> {
        match self.kind()? {
            AdapterKind::Memory => Ok(AdapterConfig::Memory),
            AdapterKind::File => {
                let path = non_blank(self.path.as_deref()).ok_or(AdapterError::MissingPath)?;
                Ok(AdapterConfig::File {
                    path: PathBuf::from(path),
                })
            }
            AdapterKind::Relational => {
                let dsn = non_blank(self.dsn.as_deref()).ok_or(AdapterError::MissingDsn)?;
                let driver: Driver = self.driver.as_deref().unwrap_or_default().parse()?;
                driver.connection_url(dsn)?;
                let table_name = match non_blank(self.table_name.as_deref()) {
                    Some(name) => validate_table_name(name)?,
                    None => DEFAULT_TABLE_NAME.to_string(),
                };
                Ok(AdapterConfig::Relational(RelationalConfig {
                    driver,
                    dsn: dsn.to_string(),
                    table_name,
                }))
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_table_name(name: &str) -> AdapterResult<String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_start && valid_rest && name.len() <= MAX_TABLE_NAME_LEN {
        Ok(name.to_string())
    } else {
        Err(AdapterError::InvalidTableName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: &str) -> AdapterSpec {
        AdapterSpec {
            kind: Some(kind.to_string()),
            ..AdapterSpec::default()
        }
    }

    #[test]
    fn default_kind_is_memory() {
        assert_eq!(AdapterSpec::default().kind().expect("kind"), AdapterKind::Memory);
        assert_eq!(AdapterSpec::default().resolve().expect("resolve"), AdapterConfig::Memory);
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(matches!(
            spec("redis").kind(),
            Err(AdapterError::UnknownType(kind)) if kind == "redis"
        ));
    }

    #[test]
    fn file_requires_path() {
        assert!(matches!(spec("file").resolve(), Err(AdapterError::MissingPath)));
        let mut with_path = spec("FILE");
        with_path.path = Some("/etc/policy.csv".into());
        assert_eq!(
            with_path.resolve().expect("resolve"),
            AdapterConfig::File {
                path: PathBuf::from("/etc/policy.csv")
            }
        );
    }

    #[test]
    fn relational_requires_dsn_and_supported_driver() {
        let mut relational = spec("relational");
        relational.driver = Some("sqlite3".into());
        assert!(matches!(relational.resolve(), Err(AdapterError::MissingDsn)));

        relational.dsn = Some(":memory:".into());
        relational.driver = Some("oracle".into());
        assert!(matches!(
            relational.resolve(),
            Err(AdapterError::UnsupportedDriver(name)) if name == "oracle"
        ));

        relational.driver = Some("SQLite".into());
        let AdapterConfig::Relational(config) = relational.resolve().expect("resolve") else {
            panic!("expected relational config");
        };
        assert_eq!(config.driver, Driver::Sqlite);
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
    }

    #[test]
    fn gorm_alias_maps_to_relational() {
        assert_eq!(spec("gorm").kind().expect("kind"), AdapterKind::Relational);
    }

    #[test]
    fn table_name_must_be_identifier() {
        let mut relational = spec("relational");
        relational.driver = Some("sqlite".into());
        relational.dsn = Some(":memory:".into());
        relational.table_name = Some("rules; DROP TABLE users".into());
        assert!(matches!(
            relational.resolve(),
            Err(AdapterError::InvalidTableName(_))
        ));

        relational.table_name = Some("authz_rules_v2".into());
        let AdapterConfig::Relational(config) = relational.resolve().expect("resolve") else {
            panic!("expected relational config");
        };
        assert_eq!(config.table_name, "authz_rules_v2");
    }

    #[test]
    fn connection_urls_per_driver() {
        assert_eq!(
            Driver::Sqlite.connection_url(":memory:").expect("url"),
            "sqlite::memory:"
        );
        assert_eq!(
            Driver::Sqlite.connection_url("/tmp/rules.db").expect("url"),
            "sqlite:///tmp/rules.db?mode=rwc"
        );
        assert_eq!(
            Driver::Postgres
                .connection_url("postgres://app@db/authz")
                .expect("url"),
            "postgres://app@db/authz"
        );
        assert_eq!(
            Driver::MySql.connection_url("mysql://app@db/authz").expect("url"),
            "mysql://app@db/authz"
        );
    }

    #[test]
    fn native_dsns_translate_to_urls() {
        assert_eq!(
            Driver::Postgres
                .connection_url("host=db user=app dbname=authz")
                .expect("url"),
            "postgres://app@db/authz"
        );
        assert_eq!(
            Driver::MySql
                .connection_url("app:secret@tcp(db:3306)/authz?parseTime=true")
                .expect("url"),
            "mysql://app:secret@db:3306/authz?parseTime=true"
        );
        assert!(matches!(
            Driver::MySql.connection_url("not a dsn"),
            Err(AdapterError::InvalidDsn { driver: "mysql", .. })
        ));
    }

    #[test]
    fn mysql_columns_are_narrower() {
        assert_eq!(Driver::Postgres.value_width(), 512);
        assert_eq!(Driver::Sqlite.value_width(), 512);
        assert_eq!(Driver::MySql.value_width(), 128);
        // Seven utf8 columns must fit InnoDB's 3072-byte key.
        assert!(Driver::MySql.value_width() * 3 * 7 <= 3072);
    }

    #[test]
    fn debug_redacts_dsn() {
        let config = RelationalConfig {
            driver: Driver::Postgres,
            dsn: "postgres://app:secret@db/authz".into(),
            table_name: DEFAULT_TABLE_NAME.into(),
        };
        assert!(!format!("{config:?}").contains("secret"));
    }
}
