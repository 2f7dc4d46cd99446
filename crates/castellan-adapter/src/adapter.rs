//! Store selection: one concrete adapter type over the three backends.
use crate::{AdapterConfig, AdapterResult, MemoryPolicyStore, RelationalAdapter};
use async_trait::async_trait;
use casbin::{Adapter, FileAdapter, Filter, Model};
use std::path::PathBuf;

/// Rows the memory store starts with. Ignored by the other stores.
#[derive(Debug, Clone, Default)]
pub struct SeedRows {
    pub policies: Vec<Vec<String>>,
    pub groupings: Vec<Vec<String>>,
}

pub enum PolicyAdapter {
    Memory(MemoryPolicyStore),
    File(FileAdapter<PathBuf>),
    Relational(RelationalAdapter),
}

impl PolicyAdapter {
    pub fn backend_name(&self) -> &'static str {
        match self {
            PolicyAdapter::Memory(_) => "memory",
            PolicyAdapter::File(_) => "file",
            PolicyAdapter::Relational(_) => "relational",
        }
    }
}

/// Build the store described by `config`.
///
/// # Errors
/// - Relational connection or schema failures. Memory and file stores do no
///   I/O here; the file is read on first load.
pub async fn build_adapter(config: &AdapterConfig, seed: SeedRows) -> AdapterResult<PolicyAdapter> {
    match config {
        AdapterConfig::Memory => Ok(PolicyAdapter::Memory(MemoryPolicyStore::with_rows(
            seed.policies,
            seed.groupings,
        ))),
        AdapterConfig::File { path } => Ok(PolicyAdapter::File(FileAdapter::new(path.clone()))),
        AdapterConfig::Relational(relational) => Ok(PolicyAdapter::Relational(
            RelationalAdapter::connect(relational).await?,
        )),
    }
}

macro_rules! dispatch {
    ($self:ident, $adapter:ident => $call:expr) => {
        match $self {
            PolicyAdapter::Memory($adapter) => $call,
            PolicyAdapter::File($adapter) => $call,
            PolicyAdapter::Relational($adapter) => $call,
        }
    };
}

#[async_trait]
impl Adapter for PolicyAdapter {
    async fn load_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        dispatch!(self, a => a.load_policy(m).await)
    }

    async fn load_filtered_policy<'a>(
        &mut self,
        m: &mut dyn Model,
        f: Filter<'a>,
    ) -> casbin::Result<()> {
        dispatch!(self, a => a.load_filtered_policy(m, f).await)
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        dispatch!(self, a => a.save_policy(m).await)
    }

    async fn clear_policy(&mut self) -> casbin::Result<()> {
        dispatch!(self, a => a.clear_policy().await)
    }

    fn is_filtered(&self) -> bool {
        dispatch!(self, a => a.is_filtered())
    }

    async fn add_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        dispatch!(self, a => a.add_policy(sec, ptype, rule).await)
    }

    async fn add_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        dispatch!(self, a => a.add_policies(sec, ptype, rules).await)
    }

    async fn remove_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        dispatch!(self, a => a.remove_policy(sec, ptype, rule).await)
    }

    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        dispatch!(self, a => a.remove_policies(sec, ptype, rules).await)
    }

    async fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> casbin::Result<bool> {
        dispatch!(self, a => a.remove_filtered_policy(sec, ptype, field_index, field_values).await)
    }
}
