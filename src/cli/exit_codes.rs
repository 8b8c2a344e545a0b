//! CLI Exit Codes
//!
//! Stable exit codes so scripts can tell modem failures apart.

use crate::config::ConfigError;
use crate::core::error::ModemError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Port could not be opened
    pub const CONNECTION_FAILED: u8 = 3;

    /// No terminal token within the command timeout
    pub const TIMEOUT: u8 = 4;

    /// Permission denied on the port
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Unparseable modem response
    pub const PROTOCOL_ERROR: u8 = 9;

    /// Modem answered `ERROR` / `+CME ERROR` / `+CMS ERROR`
    pub const COMMAND_FAILED: u8 = 10;

    /// Another command was in flight
    pub const DEVICE_BUSY: u8 = 13;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Modem stream closed
    pub const SESSION_CLOSED: u8 = 15;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success that prints a message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&ModemError> for CliResult {
    fn from(err: &ModemError) -> Self {
        let code = match err {
            ModemError::Busy { .. } => ExitCodes::DEVICE_BUSY,
            ModemError::CommandFailed(_) => ExitCodes::COMMAND_FAILED,
            ModemError::Parse { .. } => ExitCodes::PROTOCOL_ERROR,
            ModemError::Timeout { .. } => ExitCodes::TIMEOUT,
            ModemError::InvalidArgument(_) => ExitCodes::INVALID_ARGS,
            ModemError::SessionClosed => ExitCodes::SESSION_CLOSED,
            ModemError::Transport(TransportError::PortNotFound(_)) => ExitCodes::PORT_NOT_FOUND,
            ModemError::Transport(TransportError::PermissionDenied(_)) => {
                ExitCodes::PERMISSION_DENIED
            }
            ModemError::Transport(_) => ExitCodes::CONNECTION_FAILED,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<ModemError> for CliResult {
    fn from(err: ModemError) -> Self {
        Self::from(&err)
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Command timed out",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Unparseable modem response",
        10 => "Modem rejected the command",
        13 => "Another command in progress",
        14 => "Port not found",
        15 => "Modem session closed",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 7, 8, 9, 10, 13, 14, 15, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_from_modem_error() {
        let busy = ModemError::Busy {
            pending: "AT+CSQ".to_string(),
        };
        let result = CliResult::from(&busy);
        assert_eq!(result.code(), ExitCodes::DEVICE_BUSY);
        assert_eq!(result.message(), Some("Another command in progress: AT+CSQ"));

        let failed = CliResult::from(ModemError::CommandFailed("+CME ERROR: SIM not inserted".into()));
        assert_eq!(failed.code(), ExitCodes::COMMAND_FAILED);

        let missing = CliResult::from(ModemError::Transport(TransportError::PortNotFound(
            "/dev/ttyUSB9".into(),
        )));
        assert_eq!(missing.code(), ExitCodes::PORT_NOT_FOUND);
    }

    #[test]
    fn test_descriptions_cover_codes() {
        for code in [0, 1, 2, 3, 4, 7, 8, 9, 10, 13, 14, 15, 127] {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
    }
}
