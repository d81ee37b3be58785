//! Unified error type for the shifumi services.

use shifumi_engine::EngineError;
use shifumi_log::LogError;

use crate::ConfigError;

/// Top-level error returned by the server builder, the serve loop and
/// the binaries.
#[derive(Debug, thiserror::Error)]
pub enum ShifumiError {
    /// Startup configuration is missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connecting to the append-only log failed.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The round resolver stopped with an error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Binding or serving the HTTP listener failed.
    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
