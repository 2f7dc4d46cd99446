//! Moving rows between a Casbin model and store-side [`RuleRow`]s.
use casbin::{Filter, Model};
use castellan_policy::{RuleKind, RuleRow, matches_filter};

/// Insert `rule` into the model. Rows whose rule-kind the model does not
/// define are skipped.
pub(crate) fn load_rule(rule: &RuleRow, model: &mut dyn Model) -> bool {
    match rule.kind() {
        Some(kind) => model.add_policy(kind.section(), &rule.ptype, rule.values.clone()),
        None => false,
    }
}

/// Every rule the model currently holds, `p` section first, rule-kind names
/// in sorted order so full saves are deterministic.
pub(crate) fn model_rows(model: &dyn Model) -> Vec<RuleRow> {
    let mut rows = Vec::new();
    for kind in [RuleKind::Policy, RuleKind::Grouping] {
        let sec = kind.section();
        let Some(assertions) = model.get_model().get(sec) else {
            continue;
        };
        let mut ptypes: Vec<&String> = assertions.keys().collect();
        ptypes.sort();
        for ptype in ptypes {
            for values in model.get_policy(sec, ptype) {
                rows.push(RuleRow::new(ptype.clone(), values));
            }
        }
    }
    rows
}

/// Filtered loads keep rows whose leading fields match the section's filter.
pub(crate) fn passes_filter(rule: &RuleRow, filter: &Filter<'_>) -> bool {
    let wanted = match rule.kind() {
        Some(RuleKind::Policy) => &filter.p,
        Some(RuleKind::Grouping) => &filter.g,
        None => return false,
    };
    let wanted: Vec<String> = wanted.iter().map(|v| v.to_string()).collect();
    matches_filter(&rule.values, 0, &wanted)
}
