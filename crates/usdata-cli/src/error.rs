use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid --args: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Gateway(#[from] usdata_core::GatewayError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("server error: {0:#}")]
    Serve(#[from] anyhow::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgs(_) => 2,
            Self::Gateway(_) => 1,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Serve(_) => 1,
        }
    }
}
