use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum number of characters of an upstream error body echoed back to callers.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// A single violated argument constraint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{field}: required field is missing")]
    Missing { field: String },
    #[error("{field}: expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("{field}: must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{field}: must match {pattern} (got '{value}')")]
    Pattern {
        field: String,
        pattern: String,
        value: String,
    },
    #[error("{field}: must be one of {allowed} (got '{value}')")]
    NotAllowed {
        field: String,
        allowed: String,
        value: String,
    },
    #[error("{field}: must contain between {min} and {max} items (got {len})")]
    ItemCount {
        field: String,
        min: usize,
        max: usize,
        len: usize,
    },
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("at least one of {} is required", .fields.join(", "))]
    MissingAnyOf { fields: Vec<String> },
}

impl Violation {
    /// Name of the offending field, or the comma-joined group for `MissingAnyOf`.
    pub fn field(&self) -> String {
        match self {
            Self::Missing { field }
            | Self::WrongType { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::Pattern { field, .. }
            | Self::NotAllowed { field, .. }
            | Self::ItemCount { field, .. }
            | Self::Invalid { field, .. } => field.clone(),
            Self::MissingAnyOf { fields } => fields.join(","),
        }
    }
}

/// Caller input failed one or more declared constraints. Always raised before any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid parameters: {}", render_violations(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self::new(vec![violation])
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn fields(&self) -> Vec<String> {
        self.violations.iter().map(Violation::field).collect()
    }
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Gateway-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    UnknownOperation,
    Precondition,
    Transport,
    Application,
    Internal,
}

/// Structured gateway error carried as a value from adapters to the envelope builder.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    metadata: Map<String, Value>,
}

impl GatewayError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            metadata: Map::new(),
        }
    }

    pub fn validation(error: ValidationError) -> Self {
        Self::new(ErrorKind::Validation, error.to_string())
    }

    pub fn unknown_operation(name: &str) -> Self {
        Self::new(ErrorKind::UnknownOperation, format!("Unknown operation: {name}"))
    }

    pub fn invalid_provider(name: &str) -> Self {
        Self::new(
            ErrorKind::Validation,
            format!(
                "invalid provider '{name}', expected one of census, labor, air_quality, drugs, filings"
            ),
        )
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Non-2xx upstream reply, surfaced as `HTTP {status}: {truncated body}`.
    pub fn http_status(status: u16, body: &str) -> Self {
        let mut error = Self::new(
            ErrorKind::Transport,
            format!("HTTP {status}: {}", truncate_body(body)),
        );
        error.status = Some(status);
        error
    }

    /// Non-2xx upstream reply with a provider-specific message instead of the body.
    pub fn http_status_with_message(status: u16, message: impl Into<String>) -> Self {
        let mut error = Self::new(
            ErrorKind::Transport,
            format!("HTTP {status}: {}", message.into()),
        );
        error.status = Some(status);
        error
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.message, self.metadata)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Validation => "gateway.validation",
            ErrorKind::UnknownOperation => "gateway.unknown_operation",
            ErrorKind::Precondition => "gateway.precondition",
            ErrorKind::Transport => "gateway.transport",
            ErrorKind::Application => "gateway.application",
            ErrorKind::Internal => "gateway.internal",
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for GatewayError {}

impl From<ValidationError> for GatewayError {
    fn from(error: ValidationError) -> Self {
        Self::validation(error)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_owned();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_every_field() {
        let error = ValidationError::new(vec![
            Violation::OutOfRange {
                field: String::from("year"),
                min: 2000,
                max: 2030,
                value: 1999,
            },
            Violation::Pattern {
                field: String::from("state"),
                pattern: String::from("^[0-9]{2}$"),
                value: String::from("1"),
            },
        ]);

        let message = error.to_string();
        assert!(message.starts_with("Invalid parameters: "));
        assert!(message.contains("year: must be between 2000 and 2030 (got 1999)"));
        assert!(message.contains("state: must match ^[0-9]{2}$ (got '1')"));
        assert_eq!(error.fields(), vec!["year", "state"]);
    }

    #[test]
    fn http_status_truncates_long_bodies() {
        let body = "x".repeat(1_000);
        let error = GatewayError::http_status(500, &body);

        assert_eq!(error.kind(), ErrorKind::Transport);
        assert_eq!(error.status(), Some(500));
        assert_eq!(error.message().len(), "HTTP 500: ".len() + MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            GatewayError::precondition("missing key").code(),
            "gateway.precondition"
        );
        assert_eq!(
            GatewayError::unknown_operation("nope").message(),
            "Unknown operation: nope"
        );
    }
}
