//! Core module containing the modem protocol engine
//!
//! This module provides:
//! - Transport layer (serial ports, line speed setup, any async byte stream)
//! - Line framing of the modem's output
//! - Command session with echo suppression and terminal token detection
//! - Unsolicited notification classification and event dispatch
//! - Response decoders (SMS, UCS2, signal, registration, operator, clock)
//! - Traffic transcript with timestamps
//! - The [`ModemClient`](client::ModemClient) façade

pub mod classifier;
pub mod client;
pub mod codec;
pub mod engine;
pub mod error;
pub mod event;
pub mod framer;
pub mod logger;
pub mod response;
pub mod session;
pub mod sms;
pub mod transport;
