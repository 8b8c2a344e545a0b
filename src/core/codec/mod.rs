//! Text codecs used by modem responses
//!
//! With `AT+CSCS="UCS2"` the modem reports numbers and message bodies as
//! hex-encoded UTF-16 code units.

mod ucs2;

pub use ucs2::{decode_ucs2, encode_ucs2, is_ucs2_hex, DECODE_FAILED};
