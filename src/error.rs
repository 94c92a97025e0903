//! Error types for the filecoin-pin storage provider

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// The executable is missing, not executable, or failed its version check.
    /// Fatal at construction time.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{command} command timed out after {after}")]
    Timeout { command: String, after: String },

    /// Non-zero exit from the pinning tool. Displays the trimmed stderr only,
    /// which is what callers see as the failure message.
    #[error("{message}")]
    ToolFailed {
        message: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("filecoin-pin completed without returning a Root CID")]
    MissingRootCid { stdout: String, stderr: String },

    #[error("Gateway {gateway} returned HTTP {status}")]
    GatewayStatus { gateway: String, status: u16 },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to retrieve {cid} from any IPFS gateway ({} attempted)", attempts.len())]
    RetrievalFailed { cid: String, attempts: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a timeout bound the way operators read it ("5 minutes", "2 seconds").
pub(crate) fn describe_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{secs} seconds")
    }
}
