use serde_json::{json, Value};
use usdata_core::Gateway;

use crate::cli::OperationsArgs;

/// One catalogue entry per operation, in registration order.
pub fn run(args: &OperationsArgs, gateway: &Gateway) -> Vec<Value> {
    gateway
        .registry()
        .iter()
        .filter(|spec| args.provider.is_none_or(|provider| spec.provider == provider))
        .map(|spec| {
            let mut entry = spec.describe();
            entry["provider"] = json!(spec.provider.as_str());
            entry["agency"] = json!(spec.provider.agency());
            entry
        })
        .collect()
}
