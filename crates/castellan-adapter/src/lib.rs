//! Castellan policy stores.
//!
//! # Purpose
//! Persists policy and grouping rows for the matching engine. Three
//! interchangeable stores implement [`casbin::Adapter`]:
//! - [`MemoryPolicyStore`]: two ordered sequences under a mutex, fully mutable.
//! - flat file: Casbin's CSV-like [`casbin::FileAdapter`] keyed by a path.
//! - [`RelationalAdapter`]: one row per rule in a fixed 8-column table on
//!   Postgres, MySQL, or SQLite.
//!
//! # How it fits
//! The authz service resolves an [`AdapterSpec`] into an [`AdapterConfig`] and
//! calls [`build_adapter`]; the resulting [`PolicyAdapter`] is handed to
//! `castellan_policy::PolicyEngine::new`.
//!
//! # Key invariants
//! - The memory store keeps duplicate rows; the relational store's composite
//!   unique index drops them. This asymmetry is deliberate and documented.
//! - Configuration errors surface from [`AdapterSpec::resolve`] before any I/O.
//!
//! # Common pitfalls
//! - The relational table name is interpolated into SQL, so it must be a plain
//!   identifier; anything else is rejected at resolve time.

mod adapter;
mod config;
mod dsn;
mod errors;
mod memory;
mod model_io;
mod relational;

pub use adapter::{PolicyAdapter, SeedRows, build_adapter};
pub use config::{
    AdapterConfig, AdapterKind, AdapterSpec, DEFAULT_TABLE_NAME, Driver, RelationalConfig,
};
pub use errors::{AdapterError, AdapterResult};
pub use memory::MemoryPolicyStore;
pub use relational::{BATCH_SIZE, RelationalAdapter, RuleRecord, VALUE_COLUMNS};
