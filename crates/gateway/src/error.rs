//! Error type shared by the gateway client and registrar.

use thiserror::Error;

/// Errors that can occur while loading or registering gateway config.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Admin API returned a non-success status.
    #[error("Admin API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Config file is not valid YAML of the expected shape.
    #[error("Failed to parse service config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A registration call failed.
    #[error("{call} failed: {source}")]
    Call {
        call: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// Config parsed but violates a constraint.
    #[error("Invalid service config: {0}")]
    InvalidConfig(String),

    /// Admin URL is malformed.
    #[error("Invalid admin URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
