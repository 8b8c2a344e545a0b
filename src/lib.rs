//! # gsmodem Core Library
//!
//! Asynchronous AT-command driver for GSM modems (SIM800 class modules)
//! attached over a serial line:
//! - One command in flight at a time, fail-fast when busy
//! - Command echo suppression and `OK` / `ERROR` / `+CME ERROR` detection
//! - Unsolicited notifications (`RING`, `+CLIP`, `+CMTI`, hang-ups) as events
//! - SMS listing and reading with UCS2 decoding
//! - Signal, registration, module status, operator and clock queries
//!
//! ## Example
//!
//! ```rust,no_run
//! use gsmodem_core::{EngineConfig, EventKind, ModemClient, ModemEvent, SerialConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let serial = SerialConfig::new("/dev/ttyUSB0", 9600);
//!     let (modem, _engine) = ModemClient::open(&serial, EngineConfig::default())?;
//!
//!     modem.on(EventKind::Ring, |event| println!("{event}"));
//!     modem.init().await?;
//!
//!     for sms in modem.list_sms().await? {
//!         println!("{} {}: {}", sms.date_string(), sms.from(), sms.message());
//!     }
//!
//!     let mut rx = modem.subscribe();
//!     while let Ok(event) = rx.recv().await {
//!         if let ModemEvent::NewSms { index } = event {
//!             println!("{}", modem.read_sms(index).await?.message());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{ModemConfig, TranscriptConfig};
pub use crate::core::client::{ModemClient, PowerDownMode, DEFAULT_INIT_COMMANDS};
pub use crate::core::engine::EngineConfig;
pub use crate::core::error::{ModemError, ModemResult};
pub use crate::core::event::{EventBus, EventKind, HangUpReason, ListenerId, ModemEvent};
pub use crate::core::framer::LineFramer;
pub use crate::core::logger::{SharedTranscript, Transcript, TranscriptFormat};
pub use crate::core::response::{ModuleStatus, PinStatus, RegistrationStatus};
pub use crate::core::session::{CommandSession, LineOutcome, SessionState};
pub use crate::core::sms::Sms;
pub use crate::core::transport::{
    configure_line_speed, list_ports, SerialConfig, SerialFlowControl, SerialParity,
    ShellRunner, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
