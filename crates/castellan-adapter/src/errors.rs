use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unknown adapter type {0:?} (supported: memory, file, relational)")]
    UnknownType(String),
    #[error("adapter.path is required for file adapter")]
    MissingPath,
    #[error("adapter.dsn is required for relational adapter")]
    MissingDsn,
    #[error("unsupported relational driver {0:?} (supported: postgres, mysql, sqlite3)")]
    UnsupportedDriver(String),
    #[error("invalid {driver} dsn: {reason}")]
    InvalidDsn {
        driver: &'static str,
        reason: &'static str,
    },
    #[error("invalid table name {0:?}: expected a plain SQL identifier")]
    InvalidTableName(String),
    #[error("field index {index} is out of range for {columns} value columns")]
    FieldIndex { index: usize, columns: usize },
    #[error("{op}: {source}")]
    Sql {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl AdapterError {
    pub(crate) fn sql(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| AdapterError::Sql { op, source }
    }

    /// True for errors detected from configuration alone, before any I/O.
    pub fn is_config(&self) -> bool {
        !matches!(self, AdapterError::Sql { .. } | AdapterError::FieldIndex { .. })
    }
}

impl From<AdapterError> for casbin::Error {
    fn from(err: AdapterError) -> Self {
        casbin::Error::from(casbin::error::AdapterError(Box::new(err)))
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
