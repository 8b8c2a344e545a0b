//! Error types surfaced by modem operations

use super::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result alias for modem operations
pub type ModemResult<T> = Result<T, ModemError>;

/// Errors returned by [`ModemClient`](crate::core::client::ModemClient) operations
#[derive(Error, Debug)]
pub enum ModemError {
    /// Another command is still awaiting its terminal token
    #[error("Another command in progress: {pending}")]
    Busy {
        /// Text of the command currently in flight
        pending: String,
    },

    /// The modem answered `ERROR`, `+CME ERROR` or `+CMS ERROR`
    #[error("Modem error: {0}")]
    CommandFailed(String),

    /// A response did not have the expected shape
    #[error("Failed to parse {what}: {line:?}")]
    Parse {
        /// What was being decoded
        what: &'static str,
        /// Offending line (empty if the response had no lines)
        line: String,
    },

    /// No terminal token within the configured command timeout
    #[error("Command {command:?} timed out after {after:?}")]
    Timeout {
        /// Command that was pending
        command: String,
        /// Configured timeout
        after: Duration,
    },

    /// Caller supplied an argument the modem would reject
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine task has stopped (transport closed or failed)
    #[error("Modem session closed")]
    SessionClosed,

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ModemError {
    pub(crate) fn parse(what: &'static str, line: impl Into<String>) -> Self {
        Self::Parse {
            what,
            line: line.into(),
        }
    }

    /// True for the fail-fast rejection of a second concurrent command
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}
