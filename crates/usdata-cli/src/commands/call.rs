use serde_json::Value;
use tracing::debug;
use usdata_core::{Envelope, Gateway};

use crate::cli::CallArgs;
use crate::error::CliError;

pub async fn run(args: &CallArgs, gateway: &Gateway) -> Result<Envelope, CliError> {
    let arguments = parse_arguments(&args.args)?;
    debug!(operation = %args.operation, "dispatching single call");
    Ok(gateway.dispatch(args.operation.trim(), &arguments).await)
}

fn parse_arguments(raw: &str) -> Result<Value, CliError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CliError::InvalidArgs(e.to_string()))?;
    if !value.is_object() {
        return Err(CliError::InvalidArgs(String::from(
            "expected a JSON object",
        )));
    }
    Ok(value)
}
