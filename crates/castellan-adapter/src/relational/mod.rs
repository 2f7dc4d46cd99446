//! Relational policy store on the `sqlx` any-driver.
//!
//! # What this module is
//! A [`casbin::Adapter`] that persists each rule as one row of a fixed table:
//! `id` (auto-increment), `ptype`, and six positional value columns `v0..v5`.
//! Unused trailing columns hold empty strings. A composite unique index over
//! `(ptype, v0..v5)` keeps the table free of duplicate rules.
//!
//! # Consistency / atomicity
//! - `save_policy` deletes every row and re-inserts the model's rules in
//!   batches of [`BATCH_SIZE`], all inside one transaction. A failure rolls the
//!   table back to its previous contents instead of leaving it empty.
//! - Single-row writes are individual statements. `add_policy` uses the
//!   dialect's insert-ignore form and reports whether a row was written.
//!
//! # Operational notes
//! - The schema is created at connect time (`CREATE TABLE IF NOT EXISTS`), so
//!   connection and DDL failures surface during initialization.
//! - Statements carry no timeout; a stalled database blocks the caller.
//! - DSNs may contain credentials and are never logged.
mod dialect;
mod schema;

pub use schema::{RuleRecord, VALUE_COLUMNS};

use crate::model_io::{load_rule, model_rows, passes_filter};
use crate::{AdapterError, AdapterResult, RelationalConfig};
use async_trait::async_trait;
use casbin::{Adapter, Filter, Model};
use castellan_policy::RuleRow;
use dialect::Statements;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

/// Rows per multi-row `INSERT` during a full save.
pub const BATCH_SIZE: usize = 100;

const MAX_CONNECTIONS: u32 = 5;

pub struct RelationalAdapter {
    pool: AnyPool,
    statements: Statements,
    is_filtered: bool,
}

impl RelationalAdapter {
    /// Open a pool for `config` and make sure the rule table exists.
    ///
    /// # Errors
    /// - Configuration errors for a DSN the driver cannot use.
    /// - [`AdapterError::Sql`] for connection or schema failures.
    pub async fn connect(config: &RelationalConfig) -> AdapterResult<Self> {
        sqlx::any::install_default_drivers();
        let url = config.driver.connection_url(&config.dsn)?;
        let mut options = AnyPoolOptions::new().max_connections(MAX_CONNECTIONS);
        if config.driver.is_in_memory(&url) {
            // Every SQLite memory connection is a separate database.
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect(&url)
            .await
            .map_err(AdapterError::sql("connect"))?;
        let adapter = Self {
            pool,
            statements: Statements::new(config.driver, &config.table_name),
            is_filtered: false,
        };
        adapter.ensure_schema().await?;
        tracing::info!(
            driver = %config.driver,
            table = %config.table_name,
            "relational policy store ready"
        );
        Ok(adapter)
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> AdapterResult<()> {
        for ddl in self.statements.create_table() {
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(AdapterError::sql("create table"))?;
        }
        Ok(())
    }

    pub async fn fetch_rules(&self) -> AdapterResult<Vec<RuleRow>> {
        let records = sqlx::query_as::<_, RuleRecord>(&self.statements.select_all())
            .fetch_all(&self.pool)
            .await
            .map_err(AdapterError::sql("load rules"))?;
        Ok(records.into_iter().map(RuleRecord::into_rule).collect())
    }

    /// Delete everything, then insert `rules`, in one transaction.
    pub async fn replace_rules(&self, rules: &[RuleRow]) -> AdapterResult<()> {
        let records: Vec<RuleRecord> = rules.iter().map(RuleRecord::from_rule).collect();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(AdapterError::sql("begin save"))?;
        sqlx::query(&self.statements.delete_all())
            .execute(&mut *tx)
            .await
            .map_err(AdapterError::sql("clear rules"))?;
        for chunk in records.chunks(BATCH_SIZE) {
            let sql = self.statements.insert_batch(chunk.len());
            let mut query = sqlx::query(&sql);
            for record in chunk {
                for value in record.columns() {
                    query = query.bind(value.to_string());
                }
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(AdapterError::sql("insert rules"))?;
        }
        tx.commit().await.map_err(AdapterError::sql("commit save"))?;
        tracing::debug!(rows = records.len(), "relational policy store replaced");
        Ok(())
    }

    pub async fn insert_rule(&self, rule: &RuleRow) -> AdapterResult<bool> {
        let record = RuleRecord::from_rule(rule);
        let sql = self.statements.insert_ignore();
        let mut query = sqlx::query(&sql);
        for value in record.columns() {
            query = query.bind(value.to_string());
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(AdapterError::sql("insert rule"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_rule(&self, rule: &RuleRow) -> AdapterResult<bool> {
        let record = RuleRecord::from_rule(rule);
        let sql = self.statements.delete_exact();
        let mut query = sqlx::query(&sql);
        for value in record.columns() {
            query = query.bind(value.to_string());
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(AdapterError::sql("delete rule"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete rows of `ptype` whose value columns starting at `field_index`
    /// equal the non-empty entries of `field_values`.
    pub async fn delete_filtered(
        &self,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> AdapterResult<bool> {
        let mut columns = Vec::new();
        let mut binds = vec![ptype.to_string()];
        for (offset, value) in field_values.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let index = field_index + offset;
            if index >= VALUE_COLUMNS.len() {
                return Err(AdapterError::FieldIndex {
                    index,
                    columns: VALUE_COLUMNS.len(),
                });
            }
            columns.push(VALUE_COLUMNS[index]);
            binds.push(value.clone());
        }
        let sql = self.statements.delete_where(&columns);
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(AdapterError::sql("delete filtered rules"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Adapter for RelationalAdapter {
    async fn load_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        for rule in self.fetch_rules().await? {
            load_rule(&rule, m);
        }
        self.is_filtered = false;
        Ok(())
    }

    async fn load_filtered_policy<'a>(
        &mut self,
        m: &mut dyn Model,
        f: Filter<'a>,
    ) -> casbin::Result<()> {
        for rule in self.fetch_rules().await? {
            if passes_filter(&rule, &f) {
                load_rule(&rule, m);
            }
        }
        self.is_filtered = true;
        Ok(())
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        let rules = model_rows(&*m);
        self.replace_rules(&rules).await?;
        Ok(())
    }

    async fn clear_policy(&mut self) -> casbin::Result<()> {
        self.replace_rules(&[]).await?;
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    async fn add_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        Ok(self.insert_rule(&RuleRow::new(ptype, rule)).await?)
    }

    async fn add_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        let mut added = false;
        for rule in rules {
            added |= self.insert_rule(&RuleRow::new(ptype, rule)).await?;
        }
        Ok(added)
    }

    async fn remove_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        Ok(self.delete_rule(&RuleRow::new(ptype, rule)).await?)
    }

    async fn remove_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        let mut removed = false;
        for rule in rules {
            removed |= self.delete_rule(&RuleRow::new(ptype, rule)).await?;
        }
        Ok(removed)
    }

    async fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> casbin::Result<bool> {
        Ok(self
            .delete_filtered(ptype, field_index, &field_values)
            .await?)
    }
}
