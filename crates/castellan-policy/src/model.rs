//! Declarative model text validation.
//!
//! The grammar itself belongs to Casbin; this module only checks that the text
//! is non-empty and names every required section so failures point at the
//! missing piece instead of a generic parser message.
use crate::{PolicyError, PolicyResult};

/// Sections every model must define. `[role_definition]` is optional.
pub const REQUIRED_SECTIONS: [&str; 4] = [
    "request_definition",
    "policy_definition",
    "policy_effect",
    "matchers",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelText {
    text: String,
    has_roles: bool,
}

impl ModelText {
    pub fn parse(text: &str) -> PolicyResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PolicyError::EmptyModel);
        }
        let sections: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
            .map(str::trim)
            .collect();
        for required in REQUIRED_SECTIONS {
            if !sections.contains(&required) {
                return Err(PolicyError::MissingSection(required));
            }
        }
        Ok(Self {
            text: text.to_string(),
            has_roles: sections.contains(&"role_definition"),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn has_role_definition(&self) -> bool {
        self.has_roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RBAC: &str = r#"
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

    #[test]
    fn parses_full_model() {
        let model = ModelText::parse(RBAC).expect("model");
        assert!(model.has_role_definition());
        assert!(model.as_str().starts_with("[request_definition]"));
    }

    #[test]
    fn rejects_blank_text() {
        assert!(matches!(
            ModelText::parse("  \n\t"),
            Err(PolicyError::EmptyModel)
        ));
    }

    #[test]
    fn names_missing_section() {
        let text = RBAC.replace("[matchers]", "[matcher]");
        assert!(matches!(
            ModelText::parse(&text),
            Err(PolicyError::MissingSection("matchers"))
        ));
    }
}
