mod call;
mod operations;
mod serve;

use std::process::ExitCode;
use std::sync::Arc;

use usdata_core::{Gateway, GatewayConfig, ShutdownGuard};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output;

/// Exit code for an operation whose envelope reports `success = false`.
const ENVELOPE_FAILURE: u8 = 3;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = GatewayConfig::from_env();
    let gateway = Arc::new(Gateway::from_config(&config)?);
    let guard = ShutdownGuard::new(Arc::clone(&gateway));

    match &cli.command {
        None | Some(Command::Serve) => {
            serve::run(guard, cli.operation_timeout_ms).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Call(args)) => {
            let envelope = call::run(args, guard.gateway()).await?;
            output::render_envelope(&envelope, cli.format, cli.pretty)?;
            if envelope.success {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(ENVELOPE_FAILURE))
            }
        }
        Some(Command::Operations(args)) => {
            let catalogue = operations::run(args, guard.gateway());
            output::render_catalogue(&catalogue, cli.format, cli.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
