//! Error types for the two data sources and the display sink.
//!
//! Sources never let these escape a cycle: they are logged at the source
//! boundary and the source contributes nothing. The sink error is returned to
//! the ticker, which logs it and moves on to the next cycle.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a bus line ref or the train feed produced no data this cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(StatusCode),

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("feed decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unexpected JSON shape: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upstream reported an error: {0}")]
    Upstream(String),

    #[error("response carried no StopMonitoringDelivery")]
    MissingDelivery,
}

/// Failure to push a report to the display.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to write to display: {0}")]
    Write(#[from] std::io::Error),

    #[error("display worker panicked or was cancelled: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
