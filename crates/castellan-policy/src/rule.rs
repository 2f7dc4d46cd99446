//! Rule row shapes shared by the engine and the policy stores.
//!
//! # Purpose
//! A stored rule is an ordered list of string fields tagged with its rule-kind
//! name (`p`, `g`, `g2`, ...). The section it belongs to (`p` or `g`) is the
//! first character of that name.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Section a rule lives in: plain policy rows or grouping (role) rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Policy,
    Grouping,
}

impl RuleKind {
    pub fn section(self) -> &'static str {
        match self {
            RuleKind::Policy => "p",
            RuleKind::Grouping => "g",
        }
    }

    /// Rule-kind name used when callers do not name one explicitly.
    pub fn default_ptype(self) -> &'static str {
        self.section()
    }

    pub fn from_section(sec: &str) -> Option<Self> {
        match sec {
            "p" => Some(RuleKind::Policy),
            "g" => Some(RuleKind::Grouping),
            _ => None,
        }
    }

    /// Section for a rule-kind name such as `p`, `g`, or `g2`.
    pub fn from_ptype(ptype: &str) -> Option<Self> {
        match ptype.chars().next() {
            Some('p') => Some(RuleKind::Policy),
            Some('g') => Some(RuleKind::Grouping),
            _ => None,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleRow {
    pub ptype: String,
    pub values: Vec<String>,
}

impl RuleRow {
    pub fn new(ptype: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            ptype: ptype.into(),
            values,
        }
    }

    pub fn kind(&self) -> Option<RuleKind> {
        RuleKind::from_ptype(&self.ptype)
    }

    /// Flat-file form: `ptype, v0, v1, ...`.
    pub fn to_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.values.len() + 1);
        parts.push(self.ptype.as_str());
        parts.extend(self.values.iter().map(String::as_str));
        parts.join(", ")
    }
}

/// True when `row[field_index..]` matches `filter` positionally.
///
/// Empty filter values are wildcards. A filter reaching past the end of the
/// row never matches.
pub fn matches_filter(row: &[String], field_index: usize, filter: &[String]) -> bool {
    filter.iter().enumerate().all(|(offset, expected)| {
        match row.get(field_index + offset) {
            Some(actual) => expected.is_empty() || actual == expected,
            None => false,
        }
    })
}
