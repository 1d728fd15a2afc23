//! Errors raised while talking to yt-dlp or reading configuration.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The yt-dlp executable could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading the child's output or a local file failed.
    #[error("An IO error occurred: {0}")]
    Io(#[from] std::io::Error),
    /// yt-dlp printed something that is not the expected JSON document.
    #[error("Failed to parse yt-dlp response: {0}")]
    Json(#[from] serde_json::Error),
    /// yt-dlp exited unsuccessfully; carries its own message.
    #[error("{0}")]
    Extractor(String),
    /// The config file exists but is not valid TOML for `Settings`.
    #[error("Malformed config file: {0}")]
    Config(#[from] toml::de::Error),
}
