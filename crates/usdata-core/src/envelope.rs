use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// One normalized data row. Key order is the provider's field order.
pub type Row = Map<String, Value>;

/// Uniform result returned by every operation.
///
/// Serialized field order is `data`, `metadata`, `success`, `error`. `data` is
/// never null, and `error` is only set alongside `success = true` for
/// explicitly flagged empty results (see [`Envelope::empty_with_notice`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    pub fn success(data: Vec<Row>, metadata: Map<String, Value>) -> Self {
        Self {
            data,
            metadata,
            success: true,
            error: None,
        }
    }

    /// Empty-but-valid result that still carries an explanatory message.
    pub fn empty_with_notice(metadata: Map<String, Value>, notice: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            metadata,
            success: true,
            error: Some(notice.into()),
        }
    }

    pub fn failure(error: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            data: Vec::new(),
            metadata,
            success: false,
            error: Some(error.into()),
        }
    }

    /// The single place where a failed operation becomes a `success = false` envelope.
    pub fn from_result(result: GatewayResult<Envelope>) -> Self {
        match result {
            Ok(envelope) => envelope,
            Err(error) => Self::from_error(error),
        }
    }

    pub fn from_error(error: GatewayError) -> Self {
        let (message, metadata) = error.into_parts();
        Self::failure(message, metadata)
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

impl From<GatewayError> for Envelope {
    fn from(error: GatewayError) -> Self {
        Self::from_error(error)
    }
}

/// Converts a `json!({...})` literal into a metadata map; non-objects become empty.
pub fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
