//! Bridge between [`RuleRow`]s and the 8-column rule table.
use castellan_policy::RuleRow;
use sqlx::FromRow;

/// Positional value columns, in order.
pub const VALUE_COLUMNS: [&str; 6] = ["v0", "v1", "v2", "v3", "v4", "v5"];

/// One row of the rule table, minus the surrogate `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct RuleRecord {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
    pub v3: String,
    pub v4: String,
    pub v5: String,
}

impl RuleRecord {
    /// Unused trailing columns stay empty. Fields past the sixth do not fit
    /// the schema and are dropped.
    pub fn from_rule(rule: &RuleRow) -> Self {
        if rule.values.len() > VALUE_COLUMNS.len() {
            tracing::warn!(
                ptype = %rule.ptype,
                fields = rule.values.len(),
                "rule has more fields than value columns; extra fields dropped"
            );
        }
        let mut record = RuleRecord {
            ptype: rule.ptype.clone(),
            ..RuleRecord::default()
        };
        let slots = [
            &mut record.v0,
            &mut record.v1,
            &mut record.v2,
            &mut record.v3,
            &mut record.v4,
            &mut record.v5,
        ];
        for (slot, value) in slots.into_iter().zip(rule.values.iter()) {
            *slot = value.clone();
        }
        record
    }

    /// Values end at the first empty column.
    pub fn into_rule(self) -> RuleRow {
        let values = [self.v0, self.v1, self.v2, self.v3, self.v4, self.v5]
            .into_iter()
            .take_while(|value| !value.is_empty())
            .collect();
        RuleRow::new(self.ptype, values)
    }

    /// `ptype` then `v0..v5`, in bind order.
    pub fn columns(&self) -> [&str; 7] {
        [
            self.ptype.as_str(),
            self.v0.as_str(),
            self.v1.as_str(),
            self.v2.as_str(),
            self.v3.as_str(),
            self.v4.as_str(),
            self.v5.as_str(),
        ]
    }
}
