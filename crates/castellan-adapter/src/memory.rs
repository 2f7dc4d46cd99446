//! In-memory policy store.
//!
//! # Purpose
//! Holds policy rows and grouping rows as two ordered sequences behind a
//! single mutex. Every read and write takes the lock.
//!
//! # Durability and consistency
//! - **Not durable**: rows vanish with the process.
//! - **Duplicates are kept**: seeding or appending the same row twice stores it
//!   twice. Removing an exact row drops only its first occurrence.
//! - `save_policy` replaces both sequences from the model, which is how the
//!   enforcement layer persists after each successful mutation.
//!
//! Clones share the same rows, so a handle can observe or edit what an engine
//! loads on its next reload.
use crate::model_io::{load_rule, model_rows, passes_filter};
use async_trait::async_trait;
use casbin::{Adapter, Filter, Model};
use castellan_policy::{RuleKind, RuleRow, matches_filter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Rows {
    policies: Vec<RuleRow>,
    groupings: Vec<RuleRow>,
}

impl Rows {
    fn bucket_mut(&mut self, kind: RuleKind) -> &mut Vec<RuleRow> {
        match kind {
            RuleKind::Policy => &mut self.policies,
            RuleKind::Grouping => &mut self.groupings,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyStore {
    rows: Arc<Mutex<Rows>>,
    filtered: Arc<AtomicBool>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with `p` rows and `g` rows.
    ///
    /// # Invariants
    /// - Order is kept and duplicates are stored as given. The engine drops
    ///   duplicates when it loads, but the store itself never does.
    ///
    /// # Example
    /// ```rust
    /// use castellan_adapter::MemoryPolicyStore;
    /// use castellan_policy::RuleKind;
    ///
    /// let row = vec!["alice".to_string(), "/api".to_string(), "GET".to_string()];
    /// let store = MemoryPolicyStore::with_rows(vec![row.clone(), row], Vec::new());
    /// assert_eq!(store.rows(RuleKind::Policy).len(), 2);
    /// assert!(store.rows(RuleKind::Grouping).is_empty());
    /// ```
    pub fn with_rows(policies: Vec<Vec<String>>, groupings: Vec<Vec<String>>) -> Self {
        let rows = Rows {
            policies: policies
                .into_iter()
                .map(|values| RuleRow::new(RuleKind::Policy.default_ptype(), values))
                .collect(),
            groupings: groupings
                .into_iter()
                .map(|values| RuleRow::new(RuleKind::Grouping.default_ptype(), values))
                .collect(),
        };
        Self {
            rows: Arc::new(Mutex::new(rows)),
            filtered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the stored rows of `kind`.
    pub fn rows(&self, kind: RuleKind) -> Vec<RuleRow> {
        let rows = self.rows.lock();
        match kind {
            RuleKind::Policy => rows.policies.clone(),
            RuleKind::Grouping => rows.groupings.clone(),
        }
    }

    /// Append a row without going through an engine.
    pub fn push(&self, rule: RuleRow) -> bool {
        let Some(kind) = rule.kind() else {
            return false;
        };
        self.rows.lock().bucket_mut(kind).push(rule);
        true
    }

    fn all_rows(&self) -> Vec<RuleRow> {
        let rows = self.rows.lock();
        rows.policies
            .iter()
            .chain(rows.groupings.iter())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Adapter for MemoryPolicyStore {
    async fn load_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        for rule in self.all_rows() {
            load_rule(&rule, m);
        }
        self.filtered.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn load_filtered_policy<'a>(
        &mut self,
        m: &mut dyn Model,
        f: Filter<'a>,
    ) -> casbin::Result<()> {
        for rule in self.all_rows() {
            if passes_filter(&rule, &f) {
                load_rule(&rule, m);
            }
        }
        self.filtered.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn save_policy(&mut self, m: &mut dyn Model) -> casbin::Result<()> {
        let mut replacement = Rows::default();
        for rule in model_rows(&*m) {
            if let Some(kind) = rule.kind() {
                replacement.bucket_mut(kind).push(rule);
            }
        }
        *self.rows.lock() = replacement;
        Ok(())
    }

    async fn clear_policy(&mut self) -> casbin::Result<()> {
        *self.rows.lock() = Rows::default();
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }

    async fn add_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        Ok(self.push(RuleRow::new(ptype, rule)))
    }

    async fn add_policies(
        &mut self,
        _sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        let mut added = false;
        for rule in rules {
            added |= self.push(RuleRow::new(ptype, rule));
        }
        Ok(added)
    }

    async fn remove_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> casbin::Result<bool> {
        let target = RuleRow::new(ptype, rule);
        let Some(kind) = target.kind() else {
            return Ok(false);
        };
        let mut rows = self.rows.lock();
        let bucket = rows.bucket_mut(kind);
        match bucket.iter().position(|row| *row == target) {
            Some(index) => {
                bucket.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> casbin::Result<bool> {
        let mut removed = false;
        for rule in rules {
            removed |= self.remove_policy(sec, ptype, rule).await?;
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
        let Some(kind) = RuleKind::from_ptype(ptype) else {
            return Ok(false);
        };
        let mut rows = self.rows.lock();
        let bucket = rows.bucket_mut(kind);
        let before = bucket.len();
        bucket.retain(|row| {
            row.ptype != ptype || !matches_filter(&row.values, field_index, &field_values)
        });
        Ok(bucket.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casbin::DefaultModel;

    const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn model() -> DefaultModel {
        DefaultModel::from_str(MODEL).await.expect("model")
    }

    #[tokio::test]
    async fn seeded_rows_load_into_model() {
        let mut store = MemoryPolicyStore::with_rows(
            vec![row(&["admin", "/api", "GET"])],
            vec![row(&["alice", "admin"])],
        );
        let mut m = model().await;
        store.load_policy(&mut m).await.expect("load");
        assert_eq!(m.get_policy("p", "p"), vec![row(&["admin", "/api", "GET"])]);
        assert_eq!(m.get_policy("g", "g"), vec![row(&["alice", "admin"])]);
        assert!(!store.is_filtered());
    }

    #[tokio::test]
    async fn duplicates_are_kept_and_removed_one_at_a_time() {
        let mut store = MemoryPolicyStore::with_rows(
            vec![row(&["admin", "/api", "GET"]), row(&["admin", "/api", "GET"])],
            Vec::new(),
        );
        assert_eq!(store.rows(RuleKind::Policy).len(), 2);
        let removed = store
            .remove_policy("p", "p", row(&["admin", "/api", "GET"]))
            .await
            .expect("remove");
        assert!(removed);
        assert_eq!(store.rows(RuleKind::Policy).len(), 1);
    }

    #[tokio::test]
    async fn save_replaces_both_sequences() {
        let mut store = MemoryPolicyStore::with_rows(
            vec![row(&["stale", "/old", "GET"])],
            vec![row(&["stale", "role"])],
        );
        let mut m = model().await;
        m.add_policy("p", "p", row(&["admin", "/api", "GET"]));
        m.add_policy("g", "g", row(&["alice", "admin"]));
        store.save_policy(&mut m).await.expect("save");

        assert_eq!(
            store.rows(RuleKind::Policy),
            vec![RuleRow::new("p", row(&["admin", "/api", "GET"]))]
        );
        assert_eq!(
            store.rows(RuleKind::Grouping),
            vec![RuleRow::new("g", row(&["alice", "admin"]))]
        );
    }

    #[tokio::test]
    async fn filtered_removal_uses_offsets_and_wildcards() {
        let mut store = MemoryPolicyStore::with_rows(
            vec![
                row(&["alice", "/a", "GET"]),
                row(&["bob", "/a", "POST"]),
                row(&["carol", "/b", "GET"]),
            ],
            Vec::new(),
        );
        let removed = store
            .remove_filtered_policy("p", "p", 1, row(&["/a", ""]))
            .await
            .expect("remove filtered");
        assert!(removed);
        assert_eq!(
            store.rows(RuleKind::Policy),
            vec![RuleRow::new("p", row(&["carol", "/b", "GET"]))]
        );
    }

    #[tokio::test]
    async fn filtered_load_marks_store() {
        let mut store = MemoryPolicyStore::with_rows(
            vec![row(&["alice", "/a", "GET"]), row(&["bob", "/a", "GET"])],
            vec![row(&["alice", "admin"])],
        );
        let mut m = model().await;
        let filter = Filter {
            p: vec!["bob"],
            g: vec![],
        };
        store.load_filtered_policy(&mut m, filter).await.expect("load");
        assert!(store.is_filtered());
        assert_eq!(m.get_policy("p", "p"), vec![row(&["bob", "/a", "GET"])]);
        assert_eq!(m.get_policy("g", "g"), vec![row(&["alice", "admin"])]);
    }

    #[tokio::test]
    async fn clones_share_rows() {
        let store = MemoryPolicyStore::new();
        let handle = store.clone();
        handle.push(RuleRow::new("p", row(&["admin", "/api", "GET"])));
        assert_eq!(store.rows(RuleKind::Policy).len(), 1);
    }
}
