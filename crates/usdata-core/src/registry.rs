use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult, ValidationError};
use crate::source::ProviderId;
use crate::validation::{ArgSchema, ValidArgs};

/// A named operation: its argument schema and the provider it is bound to.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub provider: ProviderId,
    pub schema: ArgSchema,
}

impl OperationSpec {
    pub fn new(
        name: &'static str,
        provider: ProviderId,
        description: &'static str,
        schema: ArgSchema,
    ) -> Self {
        Self {
            name,
            description,
            provider,
            schema,
        }
    }

    pub fn validate(&self, args: &Value) -> Result<ValidArgs, ValidationError> {
        self.schema.validate(args)
    }

    /// Catalogue entry as advertised to remote callers.
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.schema.json_schema(),
        })
    }
}

/// Immutable-once-registered operation table in registration order.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: Vec<OperationSpec>,
    index: HashMap<&'static str, usize>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: OperationSpec) -> GatewayResult<()> {
        if self.index.contains_key(spec.name) {
            return Err(GatewayError::internal(format!(
                "operation '{}' is already registered",
                spec.name
            )));
        }
        self.index.insert(spec.name, self.operations.len());
        self.operations.push(spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.index.get(name).map(|position| &self.operations[*position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter()
    }

    pub fn for_provider(&self, provider: ProviderId) -> impl Iterator<Item = &OperationSpec> {
        self.operations
            .iter()
            .filter(move |spec| spec.provider == provider)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.operations.iter().map(|spec| spec.name).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldSpec;

    fn spec(name: &'static str) -> OperationSpec {
        OperationSpec::new(
            name,
            ProviderId::Census,
            "test operation",
            ArgSchema::new().field(FieldSpec::text("q", "query")),
        )
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = OperationRegistry::new();
        registry.register(spec("alpha")).expect("first");
        assert!(registry.register(spec("alpha")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn describes_operations_with_schema() {
        let description = spec("alpha").describe();
        assert_eq!(description["name"], "alpha");
        assert_eq!(description["inputSchema"]["properties"]["q"]["type"], "string");
    }
}
