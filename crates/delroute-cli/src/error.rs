use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] delroute_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Client(#[from] delroute_core::ClientError),

    #[error(transparent)]
    Stream(#[from] delroute_core::IterError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) => 2,
            Self::Client(_) | Self::Stream(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
