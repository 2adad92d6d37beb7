//! kubectl-style JSONPath templates
//!
//! A template is literal text with `{...}` expressions embedded in it, for
//! example `{.status.phase}` or `name={.items[0].name}`. Each expression is
//! rewritten into an RFC 9535 query rooted at `$` and evaluated with
//! `serde_json_path`. Range and conditional directives are not supported.

use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

/// JSONPath template errors
#[derive(Error, Debug)]
pub enum JsonPathError {
    #[error("Unclosed expression in JSONPath template {template:?}")]
    Unclosed { template: String },

    #[error("Empty expression in JSONPath template {template:?}")]
    Empty { template: String },

    #[error("Unsupported JSONPath directive {directive:?}")]
    UnsupportedDirective { directive: String },

    #[error("Invalid JSONPath expression {expr:?}: {message}")]
    Parse { expr: String, message: String },

    #[error("JSONPath expression {expr:?} did not match anything")]
    NotFound { expr: String },

    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug)]
enum Segment {
    Literal(String),
    Query { expr: String, path: JsonPath },
}

/// A parsed template, ready to evaluate against JSON documents
#[derive(Debug)]
pub struct JsonPathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPathTemplate {
    /// Parse and compile every expression in `template`
    pub fn parse(template: &str) -> Result<Self, JsonPathError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }

            let body = take_expression(&mut chars).ok_or_else(|| JsonPathError::Unclosed {
                template: template.to_string(),
            })?;
            let body = body.trim();
            if body.is_empty() {
                return Err(JsonPathError::Empty {
                    template: template.to_string(),
                });
            }

            if let Some(text) = quoted(body) {
                literal.push_str(text);
                continue;
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(compile(body)?);
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Render the template against `value`
    ///
    /// Strings render without quotes, other values as compact JSON. An
    /// expression selecting several nodes renders them separated by a
    /// space.
    pub fn execute(&self, value: &Value) -> Result<String, JsonPathError> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Query { expr, path } => {
                    let nodes = path.query(value).all();
                    if nodes.is_empty() {
                        return Err(JsonPathError::NotFound { expr: expr.clone() });
                    }
                    let rendered: Vec<String> = nodes.into_iter().map(render).collect();
                    out.push_str(&rendered.join(" "));
                }
            }
        }

        Ok(out)
    }

    /// Parse `body` as JSON and render the template against it
    pub fn execute_str(&self, body: &str) -> Result<String, JsonPathError> {
        let value: Value = serde_json::from_str(body)?;
        self.execute(&value)
    }

    /// The template text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Consume characters up to the closing brace, honouring quoted strings
fn take_expression(chars: &mut std::str::Chars<'_>) -> Option<String> {
    let mut body = String::new();
    let mut quote: Option<char> = None;

    for c in chars.by_ref() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '}' => return Some(body),
            None => {}
        }
        body.push(c);
    }

    None
}

fn quoted(body: &str) -> Option<&str> {
    let bytes = body.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return Some(&body[1..body.len() - 1]);
        }
    }
    None
}

fn compile(body: &str) -> Result<Segment, JsonPathError> {
    let directive = body.split_whitespace().next().unwrap_or_default();
    if matches!(directive, "range" | "end" | "if" | "else") {
        return Err(JsonPathError::UnsupportedDirective {
            directive: directive.to_string(),
        });
    }

    let expr = if body.starts_with('$') {
        body.to_string()
    } else if body.starts_with('.') || body.starts_with('[') {
        format!("${body}")
    } else if let Some(rest) = body.strip_prefix('@') {
        format!("${rest}")
    } else {
        format!("$.{body}")
    };

    let path = JsonPath::parse(&expr).map_err(|e| JsonPathError::Parse {
        expr: expr.clone(),
        message: e.to_string(),
    })?;

    Ok(Segment::Query { expr, path })
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_field() {
        let template = JsonPathTemplate::parse("{.SomeField}").unwrap();
        let value = json!({"SomeField": "someValue"});
        assert_eq!(template.execute(&value).unwrap(), "someValue");
    }

    #[test]
    fn test_nested_and_indexed() {
        let value = json!({"items": [{"name": "a", "id": 1}, {"name": "b", "id": 2}]});

        let first = JsonPathTemplate::parse("{.items[0].name}").unwrap();
        assert_eq!(first.execute(&value).unwrap(), "a");

        let ids = JsonPathTemplate::parse("{.items[*].id}").unwrap();
        assert_eq!(ids.execute(&value).unwrap(), "1 2");
    }

    #[test]
    fn test_root_forms() {
        let value = json!({"a": {"b": true}});
        for template in ["{$.a.b}", "{.a.b}", "{a.b}", "{@.a.b}"] {
            let parsed = JsonPathTemplate::parse(template).unwrap();
            assert_eq!(parsed.execute(&value).unwrap(), "true", "{template}");
        }
    }

    #[test]
    fn test_literal_text_around_expressions() {
        let value = json!({"status": {"phase": "Running", "ready": 3}});
        let template = JsonPathTemplate::parse("phase={.status.phase} ready={.status.ready}").unwrap();
        assert_eq!(template.execute(&value).unwrap(), "phase=Running ready=3");
    }

    #[test]
    fn test_quoted_literal_expression() {
        let value = json!({"a": 1});
        let template = JsonPathTemplate::parse("{.a}{\"-\"}{.a}").unwrap();
        assert_eq!(template.execute(&value).unwrap(), "1-1");
    }

    #[test]
    fn test_objects_render_as_compact_json() {
        let value = json!({"a": {"b": [1, 2]}});
        let template = JsonPathTemplate::parse("{.a}").unwrap();
        assert_eq!(template.execute(&value).unwrap(), r#"{"b":[1,2]}"#);
    }

    #[test]
    fn test_filter_with_brace_in_string() {
        let value = json!({"items": [{"name": "x}", "id": 7}]});
        let template = JsonPathTemplate::parse("{.items[?@.name=='x}'].id}").unwrap();
        assert_eq!(template.execute(&value).unwrap(), "7");
    }

    #[test]
    fn test_missing_field_is_not_found() {
        let template = JsonPathTemplate::parse("{.missing}").unwrap();
        let err = template.execute(&json!({"present": 1})).unwrap_err();
        assert!(matches!(err, JsonPathError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_json_body() {
        let template = JsonPathTemplate::parse("{.a}").unwrap();
        let err = template.execute_str("not json").unwrap_err();
        assert!(matches!(err, JsonPathError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            JsonPathTemplate::parse("{.a").unwrap_err(),
            JsonPathError::Unclosed { .. }
        ));
        assert!(matches!(
            JsonPathTemplate::parse("{ }").unwrap_err(),
            JsonPathError::Empty { .. }
        ));
        assert!(matches!(
            JsonPathTemplate::parse("{range .items[*]}{.name}{end}").unwrap_err(),
            JsonPathError::UnsupportedDirective { .. }
        ));
        assert!(matches!(
            JsonPathTemplate::parse("{.a[}").unwrap_err(),
            JsonPathError::Parse { .. }
        ));
    }
}
