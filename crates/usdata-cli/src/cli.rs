//! CLI argument definitions for usdata.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | JSON-RPC 2.0 server over stdio (default) |
//! | `call` | Run one operation and print its envelope |
//! | `operations` | List the operation catalogue |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `info` | Log filter when `RUST_LOG` is unset |
//! | `--operation-timeout-ms` | `120000` | Per-call budget when serving |
//!
//! # Examples
//!
//! ```bash
//! usdata call search_population --args '{"year": 2022, "state": "06"}' --pretty
//! usdata operations --provider filings --format table
//! usdata serve --log-level debug
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use usdata_core::ProviderId;

/// usdata - one gateway over Census, BLS, EPA AQS, openFDA and SEC EDGAR.
#[derive(Debug, Parser)]
#[command(
    name = "usdata",
    author,
    version,
    about = "Gateway over U.S. government data APIs",
    long_about = "usdata exposes Census, BLS, EPA AQS, openFDA and SEC EDGAR data as named \
operations with validated arguments and a uniform result envelope.\n\
\n\
Run without a command to serve JSON-RPC over stdio."
)]
pub struct Cli {
    /// Output format for `call` and `operations`.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Budget for one served operation in milliseconds.
    #[arg(long, global = true, default_value_t = 120_000)]
    pub operation_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve newline-delimited JSON-RPC 2.0 over stdin/stdout.
    Serve,

    /// Run one operation and print its envelope.
    ///
    /// Exits 0 on success, 3 when the envelope reports failure and 2 when
    /// `--args` is not a JSON object.
    ///
    /// # Examples
    ///
    ///   usdata call get_state_fips --args '{"state_name": "texas"}'
    ///   usdata call get_company_filings --args '{"cik": "320193", "form_type": "10-K"}'
    Call(CallArgs),

    /// List operations with their argument schemas.
    Operations(OperationsArgs),
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Operation name, e.g. search_population.
    pub operation: String,

    /// Arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    pub args: String,
}

#[derive(Debug, Args)]
pub struct OperationsArgs {
    /// Only list operations of this provider (census, labor, air_quality, drugs, filings).
    #[arg(long, value_parser = parse_provider)]
    pub provider: Option<ProviderId>,
}

fn parse_provider(value: &str) -> Result<ProviderId, String> {
    value.parse().map_err(|e: usdata_core::GatewayError| e.message().to_owned())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["usdata"]).expect("parses");
        assert!(cli.command.is_none());
        assert_eq!(cli.operation_timeout_ms, 120_000);
    }

    #[test]
    fn provider_filter_accepts_aliases() {
        let cli = Cli::try_parse_from(["usdata", "operations", "--provider", "sec"]).expect("parses");
        match cli.command {
            Some(Command::Operations(args)) => assert_eq!(args.provider, Some(ProviderId::Filings)),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["usdata", "operations", "--provider", "nasa"]).is_err());
    }
}
