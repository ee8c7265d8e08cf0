//! Declarative per-operation argument schemas.
//!
//! An [`ArgSchema`] checks a raw argument object without performing any I/O
//! and either yields a normalized [`ValidArgs`] record or a
//! [`ValidationError`] listing every violated constraint. Undeclared
//! arguments are ignored and never reach an adapter.

use std::cmp::Ordering;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::{GatewayError, GatewayResult, ValidationError, Violation};

const COMPACT_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone)]
pub struct Pattern {
    source: &'static str,
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            regex: Regex::new(source).ok(),
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn compiles(&self) -> bool {
        self.regex.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Integer { min: i64, max: i64 },
    Text { pattern: Option<Pattern> },
    Choice { allowed: &'static [&'static str] },
    StringList { min_items: usize, max_items: usize },
    /// Calendar date written `YYYYMMDD`.
    CompactDate,
    /// Calendar date written `YYYY-MM-DD`.
    IsoDate,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: &'static str,
    description: &'static str,
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
}

impl FieldSpec {
    fn new(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn integer(name: &'static str, description: &'static str, min: i64, max: i64) -> Self {
        Self::new(name, description, FieldKind::Integer { min, max })
    }

    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::Text { pattern: None })
    }

    pub fn matching(name: &'static str, description: &'static str, pattern: &'static str) -> Self {
        Self::new(
            name,
            description,
            FieldKind::Text {
                pattern: Some(Pattern::new(pattern)),
            },
        )
    }

    pub fn choice(
        name: &'static str,
        description: &'static str,
        allowed: &'static [&'static str],
    ) -> Self {
        Self::new(name, description, FieldKind::Choice { allowed })
    }

    pub fn string_list(
        name: &'static str,
        description: &'static str,
        min_items: usize,
        max_items: usize,
    ) -> Self {
        Self::new(
            name,
            description,
            FieldKind::StringList {
                min_items,
                max_items,
            },
        )
    }

    pub fn compact_date(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::CompactDate)
    }

    pub fn iso_date(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, FieldKind::IsoDate)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    fn check(&self, raw: &Value) -> Result<Value, Violation> {
        let field = self.name.to_owned();
        match &self.kind {
            FieldKind::Integer { min, max } => {
                let value = as_integer(raw).ok_or(Violation::WrongType {
                    field: field.clone(),
                    expected: "integer",
                })?;
                if value < *min || value > *max {
                    return Err(Violation::OutOfRange {
                        field,
                        min: *min,
                        max: *max,
                        value,
                    });
                }
                Ok(Value::from(value))
            }
            FieldKind::Text { pattern } => {
                let value = as_text(raw).ok_or(Violation::WrongType {
                    field: field.clone(),
                    expected: "string",
                })?;
                if let Some(pattern) = pattern {
                    let Some(regex) = &pattern.regex else {
                        return Err(Violation::Invalid {
                            field,
                            reason: format!("pattern {} does not compile", pattern.source),
                        });
                    };
                    if !regex.is_match(&value) {
                        return Err(Violation::Pattern {
                            field,
                            pattern: pattern.source.to_owned(),
                            value,
                        });
                    }
                }
                Ok(Value::String(value))
            }
            FieldKind::Choice { allowed } => {
                let value = as_text(raw).ok_or(Violation::WrongType {
                    field: field.clone(),
                    expected: "string",
                })?;
                allowed
                    .iter()
                    .find(|candidate| candidate.eq_ignore_ascii_case(&value))
                    .map(|candidate| Value::String((*candidate).to_owned()))
                    .ok_or_else(|| Violation::NotAllowed {
                        field,
                        allowed: allowed.join(", "),
                        value,
                    })
            }
            FieldKind::StringList {
                min_items,
                max_items,
            } => {
                let items = as_string_list(raw).ok_or(Violation::WrongType {
                    field: field.clone(),
                    expected: "list of strings",
                })?;
                if items.len() < *min_items || items.len() > *max_items {
                    return Err(Violation::ItemCount {
                        field,
                        min: *min_items,
                        max: *max_items,
                        len: items.len(),
                    });
                }
                Ok(Value::from(items))
            }
            FieldKind::CompactDate => check_date(raw, field, COMPACT_DATE, "YYYYMMDD"),
            FieldKind::IsoDate => check_date(raw, field, ISO_DATE, "YYYY-MM-DD"),
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            FieldKind::Integer { min, max } => {
                json!({"type": "integer", "minimum": min, "maximum": max})
            }
            FieldKind::Text { pattern: None } => json!({"type": "string"}),
            FieldKind::Text {
                pattern: Some(pattern),
            } => json!({"type": "string", "pattern": pattern.source}),
            FieldKind::Choice { allowed } => json!({"type": "string", "enum": allowed}),
            FieldKind::StringList {
                min_items,
                max_items,
            } => json!({
                "type": "array",
                "items": {"type": "string"},
                "minItems": min_items,
                "maxItems": max_items,
            }),
            FieldKind::CompactDate => json!({"type": "string", "pattern": "^[0-9]{8}$"}),
            FieldKind::IsoDate => json!({"type": "string", "format": "date"}),
        };
        if let Value::Object(map) = &mut schema {
            map.insert(
                String::from("description"),
                Value::String(self.description.to_owned()),
            );
            if let Some(default) = &self.default {
                map.insert(String::from("default"), default.clone());
            }
        }
        schema
    }
}

fn as_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn as_string_list(raw: &Value) -> Option<Vec<String>> {
    let items = match raw {
        Value::Array(values) => values.iter().map(as_text).collect::<Option<Vec<_>>>()?,
        Value::String(text) => text.split(',').map(|item| item.trim().to_owned()).collect(),
        _ => return None,
    };
    Some(items.into_iter().filter(|item| !item.is_empty()).collect())
}

fn check_date(
    raw: &Value,
    field: String,
    format: &[BorrowedFormatItem<'static>],
    shape: &str,
) -> Result<Value, Violation> {
    let text = as_text(raw).ok_or(Violation::WrongType {
        field: field.clone(),
        expected: "string",
    })?;
    match Date::parse(&text, format) {
        Ok(_) => Ok(Value::String(text)),
        Err(_) => Err(Violation::Invalid {
            field,
            reason: format!("expected a calendar date in {shape} form (got '{text}')"),
        }),
    }
}

/// Absent, null, blank strings and empty arrays are all "not provided".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Argument schema for one operation.
#[derive(Debug, Clone, Default)]
pub struct ArgSchema {
    fields: Vec<FieldSpec>,
    any_of: Vec<Vec<&'static str>>,
    ordered: Vec<(&'static str, &'static str)>,
}

impl ArgSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// At least one of `fields` must be provided.
    pub fn require_any_of(mut self, fields: &[&'static str]) -> Self {
        self.any_of.push(fields.to_vec());
        self
    }

    /// When both are provided, `lower` must not exceed `upper`.
    pub fn ordered(mut self, lower: &'static str, upper: &'static str) -> Self {
        self.ordered.push((lower, upper));
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn validate(&self, raw: &Value) -> Result<ValidArgs, ValidationError> {
        let empty = Map::new();
        let args = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(ValidationError::single(Violation::Invalid {
                    field: String::from("arguments"),
                    reason: String::from("expected an object"),
                }))
            }
        };

        let mut violations = Vec::new();
        let mut normalized = Map::new();
        let mut provided = Vec::new();

        for spec in &self.fields {
            match args.get(spec.name).filter(|value| !is_blank(value)) {
                Some(raw_value) => match spec.check(raw_value) {
                    Ok(value) => {
                        provided.push(spec.name);
                        normalized.insert(spec.name.to_owned(), value);
                    }
                    Err(violation) => violations.push(violation),
                },
                None if spec.required => violations.push(Violation::Missing {
                    field: spec.name.to_owned(),
                }),
                None => {
                    if let Some(default) = &spec.default {
                        normalized.insert(spec.name.to_owned(), default.clone());
                    }
                }
            }
        }

        for group in &self.any_of {
            let satisfied = group.iter().any(|name| provided.contains(name));
            let failed_inside = violations
                .iter()
                .any(|violation| group.iter().any(|name| violation.field() == *name));
            if !satisfied && !failed_inside {
                violations.push(Violation::MissingAnyOf {
                    fields: group.iter().map(|name| (*name).to_owned()).collect(),
                });
            }
        }

        for (lower, upper) in &self.ordered {
            if let (Some(low), Some(high)) = (normalized.get(*lower), normalized.get(*upper)) {
                if compare(low, high) == Some(Ordering::Greater) {
                    violations.push(Violation::Invalid {
                        field: (*upper).to_owned(),
                        reason: format!("must not be earlier than {lower}"),
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(ValidArgs(normalized))
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// JSON Schema advertised to callers for this operation.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|spec| (spec.name.to_owned(), spec.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
            .collect();

        let mut schema = json!({"type": "object", "properties": properties});
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if !self.any_of.is_empty() {
            schema["anyOf"] = Value::Array(
                self.any_of
                    .iter()
                    .map(|group| {
                        json!({"anyOf": group.iter().map(|name| json!({"required": [name]})).collect::<Vec<_>>()})
                    })
                    .collect(),
            );
        }
        schema
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_i64()?.partial_cmp(&b.as_i64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Normalized argument record produced by a successful validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidArgs(Map<String, Value>);

impl ValidArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Deserializes into an adapter's typed request record.
    pub fn decode<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| GatewayError::internal(format!("failed to decode arguments: {e}")))
    }
}
