//! Delay specification - the parsed form of a `sleep_ms` directive value.

use serde::{Deserialize, Serialize};

use crate::template::{has_template_variables, RequestData, Template, TemplateError};

/// Raw `sleep_ms` value as it appears in the configuration file: either a
/// bare integer or a string (literal digits or a `${request.*}` expression).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDelay {
    Millis(i64),
    Value(String),
}

impl std::fmt::Display for RawDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawDelay::Millis(ms) => write!(f, "{ms}"),
            RawDelay::Value(s) => write!(f, "{s}"),
        }
    }
}

/// Why a directive value was rejected at configuration load.
#[derive(Debug, thiserror::Error)]
pub enum ParseDelayError {
    #[error("sleep_ms must be a non-negative integer, got {0}")]
    Negative(i64),
    #[error("sleep_ms value '{0}' is not a non-negative integer")]
    NotAnInteger(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Why a dynamic value failed to resolve at request time. Never fatal to the
/// request: the evaluator logs and continues without a delay.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("expression '{0}' resolved to empty text")]
    Empty(String),
    #[error("expression '{expr}' resolved to non-numeric text '{value}'")]
    NonNumeric { expr: String, value: String },
    #[error("expression '{expr}' resolved to negative value '{value}'")]
    Negative { expr: String, value: String },
}

/// A configured delay: a literal millisecond count validated at load, or a
/// compiled per-request expression deferred to request time.
#[derive(Debug)]
pub enum DelaySpec {
    Literal(u64),
    Dynamic(Template),
}

impl DelaySpec {
    /// Parse a raw directive value. Literals are validated here; expressions
    /// are compiled but not evaluated until a request arrives.
    pub fn parse(raw: &RawDelay) -> Result<Self, ParseDelayError> {
        match raw {
            RawDelay::Millis(ms) if *ms < 0 => Err(ParseDelayError::Negative(*ms)),
            RawDelay::Millis(ms) => Ok(DelaySpec::Literal(*ms as u64)),
            RawDelay::Value(s) if has_template_variables(s) => {
                Ok(DelaySpec::Dynamic(Template::compile(s)?))
            }
            RawDelay::Value(s) => parse_millis(s)
                .map(DelaySpec::Literal)
                .ok_or_else(|| ParseDelayError::NotAnInteger(s.clone())),
        }
    }

    /// Resolve to a concrete millisecond count for one request. A no-op for
    /// literals; dynamic specs render their expression and parse the result.
    pub fn resolve(&self, request_data: &RequestData) -> Result<u64, ResolveError> {
        match self {
            DelaySpec::Literal(ms) => Ok(*ms),
            DelaySpec::Dynamic(template) => {
                let text = template.render(request_data);
                if text.is_empty() {
                    return Err(ResolveError::Empty(template.source().to_string()));
                }
                parse_millis(&text).ok_or_else(|| {
                    if text.starts_with('-') && parse_millis(&text[1..]).is_some() {
                        ResolveError::Negative {
                            expr: template.source().to_string(),
                            value: text.clone(),
                        }
                    } else {
                        ResolveError::NonNumeric {
                            expr: template.source().to_string(),
                            value: text,
                        }
                    }
                })
            }
        }
    }
}

impl std::fmt::Display for DelaySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelaySpec::Literal(ms) => write!(f, "{ms} ms"),
            DelaySpec::Dynamic(template) => write!(f, "{}", template.source()),
        }
    }
}

/// Strict millisecond parse: decimal digits only, no sign, no whitespace.
fn parse_millis(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}
