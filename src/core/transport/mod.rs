//! Transport layer for the modem byte stream
//!
//! The engine only needs a duplex byte stream; anything implementing
//! [`ModemIo`] works. Serial ports are opened through `tokio-serial`, and the
//! optional `stty` line-speed step goes through a [`ProcessRunner`].

mod process;
mod serial;

pub use process::{configure_line_speed, ProcessOutput, ProcessRunner, ShellRunner};
pub use serial::{list_ports, open_serial, SerialConfig, SerialFlowControl, SerialParity};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Duplex byte stream the modem engine runs over
pub trait ModemIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ModemIo for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Line speed command exited with a failure
    #[error("Line speed command `{command}` failed with code {code:?}: {stderr}")]
    LineSpeed {
        /// Shell command that was run
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
