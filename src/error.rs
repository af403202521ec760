//! Error taxonomy for the sync layer.
//!
//! Nothing in this crate is fatal to the host process: transport errors are
//! retried by the sync client, parse errors are swallowed with a diagnostic,
//! and command failures surface as activity log entries. These variants exist
//! so callers that do want to inspect a failure can.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The realtime channel could not be opened or dropped mid-stream.
    #[error("realtime transport: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An HTTP request failed before producing a response (timeout, DNS, ...).
    #[error("http request: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    /// A local file operation failed (log export).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_for_the_export_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SyncError = io.into();
        assert!(matches!(err, SyncError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
