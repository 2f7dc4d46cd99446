#![allow(dead_code)]

use serde_json::{Value, json};

pub const RBAC_MODEL: &str = r#"
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

/// Like `RBAC_MODEL`, plus `keyMatch` paths and a `*` action wildcard.
pub const RBAC_WILDCARD_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && keyMatch(r.obj, p.obj) && (r.act == p.act || p.act == "*")
"#;

pub fn memory_config(policies: Value, roles: Value) -> Value {
    json!({
        "model": RBAC_MODEL,
        "policies": policies,
        "roleAssignments": roles,
    })
}

pub fn row(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
