//! Templated configuration values.
//!
//! # Purpose
//! Step parameters may be literal strings or field references such as
//! `{{.request_path}}` or `{{ .user.id }}`, resolved against the merged step
//! context at execution time. Templates are compiled once, when the step is
//! built.
//!
//! # Rendering
//! - Strings render as-is; numbers and booleans as JSON text.
//! - Missing keys and `null` render as the empty string.
//! - Objects and arrays render as compact JSON.
//! - `{{.}}` renders the whole context.
use crate::errors::TemplateError;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Templated {
    Literal(String),
    Template(Template),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Field(Vec<String>),
}

/// True when `text` contains both an opening and a closing delimiter.
pub fn is_template(text: &str) -> bool {
    text.contains("{{") && text.contains("}}")
}

impl Templated {
    /// Compile `text` if it looks like a template, otherwise keep it literal.
    pub fn compile(text: &str) -> Result<Self, TemplateError> {
        if is_template(text) {
            Ok(Templated::Template(Template::parse(text)?))
        } else {
            Ok(Templated::Literal(text.to_string()))
        }
    }

    /// Like [`Templated::compile`], but a template that fails to compile is
    /// kept as a literal.
    pub fn compile_or_literal(text: &str) -> Self {
        Self::compile(text).unwrap_or_else(|err| {
            tracing::debug!(value = text, error = %err, "template kept as literal");
            Templated::Literal(text.to_string())
        })
    }

    pub fn render(&self, data: &Value) -> String {
        match self {
            Templated::Literal(text) => text.clone(),
            Templated::Template(template) => template.render(data),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Templated::Literal(_))
    }
}

impl fmt::Display for Templated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Templated::Literal(text) => f.write_str(text),
            Templated::Template(template) => f.write_str(&template.source),
        }
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                parts.push(Part::Text(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(TemplateError::Unclosed(offset + open))?;
            parts.push(Part::Field(parse_field(after_open[..close].trim())?));
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }
        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Field(path) => {
                    if let Some(value) = lookup(data, path) {
                        push_value(&mut out, value);
                    }
                }
            }
        }
        out
    }
}

fn parse_field(action: &str) -> Result<Vec<String>, TemplateError> {
    let unsupported = || TemplateError::Unsupported(action.to_string());
    let path = action.strip_prefix('.').ok_or_else(unsupported)?;
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('.')
        .map(|segment| {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_');
            if valid {
                Ok(segment.to_string())
            } else {
                Err(unsupported())
            }
        })
        .collect()
}

fn lookup<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(data, |value, segment| value.as_object()?.get(segment))
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(text) => out.push_str(text),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_stay_literal() {
        let value = Templated::compile("/api/posts").expect("compile");
        assert!(value.is_literal());
        assert_eq!(value.render(&json!({})), "/api/posts");
        // Only one delimiter: not a template.
        assert!(Templated::compile("{{ half").expect("compile").is_literal());
    }

    #[test]
    fn renders_fields_and_text() {
        let value = Templated::compile("/api/users/{{ .user.id }}/{{.kind}}").expect("compile");
        let data = json!({"user": {"id": 42}, "kind": "posts"});
        assert_eq!(value.render(&data), "/api/users/42/posts");
    }

    #[test]
    fn missing_and_null_render_empty() {
        let value = Templated::compile("[{{.missing}}|{{.nothing}}|{{.a.b.c}}]").expect("compile");
        assert_eq!(value.render(&json!({"nothing": null, "a": "flat"})), "[||]");
    }

    #[test]
    fn scalars_and_collections() {
        let value = Templated::compile("{{.flag}} {{.list}}").expect("compile");
        assert_eq!(value.render(&json!({"flag": true, "list": [1, 2]})), "true [1,2]");
    }

    #[test]
    fn compile_errors() {
        assert_eq!(
            Templated::compile("}} {{.a").expect_err("unclosed"),
            TemplateError::Unclosed(3)
        );
        assert!(matches!(
            Templated::compile("{{ len .a }}"),
            Err(TemplateError::Unsupported(action)) if action == "len .a"
        ));
        assert!(matches!(
            Templated::compile("{{.a..b}}"),
            Err(TemplateError::Unsupported(_))
        ));
    }

    #[test]
    fn failed_compile_falls_back_to_literal() {
        let value = Templated::compile_or_literal("{{ upper .name }}");
        assert_eq!(value, Templated::Literal("{{ upper .name }}".into()));
        assert_eq!(value.render(&json!({"name": "x"})), "{{ upper .name }}");
    }

    #[test]
    fn display_shows_source() {
        let value = Templated::compile("{{.path}}").expect("compile");
        assert_eq!(value.to_string(), "{{.path}}");
    }
}
