//! Errors raised while running a mapping cycle.
//!
//! None of these are fatal once the main loop is running: the reconciler
//! logs them and abandons the current cycle, and the next tick tries again.

use std::process::ExitStatus;

use crate::types::Protocol;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} -> {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("natpmpc exited with {status} for {protocol}: {output}")]
    MappingFailed {
        protocol: Protocol,
        status: ExitStatus,
        output: String,
    },

    #[error("failed to parse {what} from output")]
    Parse { what: &'static str },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} not found or invalid type")]
    Schema { field: &'static str },

    #[error("{field} update failed: expected {expected}, got {actual}")]
    Verification {
        field: &'static str,
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
