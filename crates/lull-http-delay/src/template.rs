//! Request data extraction and `${request.*}` expression compilation.
//!
//! Dynamic `sleep_ms` values reference request-scoped variables that are only
//! known once a request arrives. Expressions are compiled once at
//! configuration load into a segment list and rendered per request against a
//! read-only [`RequestData`] snapshot.
//!
//! # Supported variables
//!
//! - `${request.path}` - The request path
//! - `${request.method}` - The HTTP method
//! - `${request.query.<name>}` - Query parameter value
//! - `${request.headers.<name>}` - Header value (case-insensitive)
//! - `${request.body}` - The raw request body

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Regex for matching expression variables: ${request.path}, ${request.query.name}, etc.
static VARIABLE_REGEX: OnceLock<Regex> = OnceLock::new();

fn variable_regex() -> &'static Regex {
    VARIABLE_REGEX.get_or_init(|| {
        Regex::new(r"\$\{request\.([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)?)\}")
            .unwrap()
    })
}

/// Expression compilation failure, fatal at configuration load.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown request variable '{0}'")]
    UnknownVariable(String),
    #[error("malformed variable reference in '{0}'")]
    Malformed(String),
}

/// One piece of a compiled expression: literal text or a variable lookup.
#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Var(String),
}

/// A `${request.*}` expression compiled at configuration load, rendered per
/// request. Compilation validates every variable reference; rendering cannot
/// fail (a variable absent from the request renders as empty text).
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile an expression, validating all variable references.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        // A literal "${" with no well-formed variable inside is a config
        // mistake, not literal text to pass through.
        let matched_spans: Vec<(usize, usize, String)> = variable_regex()
            .captures_iter(source)
            .map(|caps| {
                let whole = caps.get(0).unwrap();
                (whole.start(), whole.end(), caps[1].to_string())
            })
            .collect();

        let mut dollar_positions = source.match_indices("${").map(|(i, _)| i);
        if dollar_positions.any(|i| !matched_spans.iter().any(|&(s, e, _)| i >= s && i < e)) {
            return Err(TemplateError::Malformed(source.to_string()));
        }

        let mut segments = Vec::new();
        let mut cursor = 0;
        for (start, end, path) in matched_spans {
            if !is_known_variable(&path) {
                return Err(TemplateError::UnknownVariable(format!("request.{path}")));
            }
            if start > cursor {
                segments.push(Segment::Text(source[cursor..start].to_string()));
            }
            segments.push(Segment::Var(path));
            cursor = end;
        }
        if cursor < source.len() {
            segments.push(Segment::Text(source[cursor..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Render the expression against one request.
    pub fn render(&self, request_data: &RequestData) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(path) => {
                    if let Some(value) = request_data.get(path) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }

    /// The expression as written in the configuration file.
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn is_known_variable(path: &str) -> bool {
    let parts: Vec<&str> = path.splitn(2, '.').collect();
    matches!(
        parts.as_slice(),
        ["path"] | ["method"] | ["body"] | ["query", _] | ["headers", _]
    )
}

/// Check if a raw directive value contains expression variables.
pub fn has_template_variables(s: &str) -> bool {
    s.contains("${")
}

/// Parsed request data for variable resolution
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    /// Query parameters parsed from the URL
    pub query: HashMap<String, String>,
    /// Request headers (keys lowercased)
    pub headers: HashMap<String, String>,
    /// Raw request body
    pub body: String,
}

impl RequestData {
    /// Create RequestData from request components
    pub fn new(
        method: &str,
        path: &str,
        query_string: Option<&str>,
        headers: &hyper::HeaderMap,
        body: Option<&str>,
    ) -> Self {
        let query = parse_query_string(query_string);
        let headers_map = headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_lowercase(), val.to_string()))
            })
            .collect();

        Self {
            method: method.to_string(),
            path: path.to_string(),
            query,
            headers: headers_map,
            body: body.unwrap_or("").to_string(),
        }
    }

    /// Get a value by dotted path (e.g., "query.name", "headers.content-type")
    pub fn get(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.splitn(2, '.').collect();

        match parts.as_slice() {
            ["path"] => Some(self.path.clone()),
            ["method"] => Some(self.method.clone()),
            ["body"] => Some(self.body.clone()),
            ["query", name] => self.query.get(*name).cloned(),
            ["headers", name] => self.headers.get(&name.to_lowercase()).cloned(),
            _ => None,
        }
    }
}

/// Parse query string into a HashMap
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let decoded = urlencoding::decode(value).unwrap_or_default().to_string();
                params.insert(key.to_string(), decoded);
            } else if !pair.is_empty() {
                params.insert(pair.to_string(), String::new());
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderName, HeaderValue};
    use hyper::HeaderMap;

    fn create_test_request_data() -> RequestData {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            HeaderName::from_static("x-sleep-ms"),
            HeaderValue::from_static("150"),
        );

        RequestData::new(
            "POST",
            "/users/123",
            Some("delay=30&name=John"),
            &headers,
            Some("250"),
        )
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string(Some("name=John&age=30&city=New%20York"));
        assert_eq!(params.get("name"), Some(&"John".to_string()));
        assert_eq!(params.get("age"), Some(&"30".to_string()));
        assert_eq!(params.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        let params = parse_query_string(None);
        assert!(params.is_empty());
    }

    #[test]
    fn test_request_data_get() {
        let data = create_test_request_data();

        assert_eq!(data.get("path"), Some("/users/123".to_string()));
        assert_eq!(data.get("method"), Some("POST".to_string()));
        assert_eq!(data.get("query.delay"), Some("30".to_string()));
        assert_eq!(
            data.get("headers.content-type"),
            Some("application/json".to_string())
        );
        assert_eq!(data.get("headers.X-Sleep-Ms"), Some("150".to_string()));
        assert_eq!(data.get("body"), Some("250".to_string()));
        assert_eq!(data.get("query.nonexistent"), None);
    }

    #[test]
    fn test_compile_and_render_single_variable() {
        let data = create_test_request_data();
        let template = Template::compile("${request.headers.x-sleep-ms}").unwrap();
        assert_eq!(template.render(&data), "150");
    }

    #[test]
    fn test_compile_and_render_mixed_text() {
        let data = create_test_request_data();
        let template = Template::compile("${request.query.delay}0").unwrap();
        assert_eq!(template.render(&data), "300");
    }

    #[test]
    fn test_render_missing_variable_is_empty() {
        let data = create_test_request_data();
        let template = Template::compile("${request.query.nonexistent}").unwrap();
        assert_eq!(template.render(&data), "");
    }

    #[test]
    fn test_compile_unknown_variable() {
        let err = Template::compile("${request.cookies.session}").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownVariable(_)));
    }

    #[test]
    fn test_compile_malformed_reference() {
        let err = Template::compile("${invalid}").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));

        let err = Template::compile("${request.path").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));
    }

    #[test]
    fn test_source_round_trips() {
        let source = "prefix-${request.method}-suffix";
        let template = Template::compile(source).unwrap();
        assert_eq!(template.source(), source);
    }

    #[test]
    fn test_has_template_variables() {
        assert!(has_template_variables("${request.path}"));
        assert!(has_template_variables("100${request.query.extra}"));
        assert!(!has_template_variables("100"));
    }
}
