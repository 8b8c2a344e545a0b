//! Decoders for command response lines
//!
//! Each decoder takes the lines a command produced (echo and terminal token
//! already removed) and extracts a typed value. They are pure: no I/O and no
//! state. A missing or malformed line is reported as [`ModemError::Parse`]
//! carrying the offending text.

use super::error::{ModemError, ModemResult};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static CSQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CSQ: ([0-9]+),([0-9]+)$").expect("valid CSQ pattern"));

static CREG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CREG: ([0-9]+),([0-9]+)").expect("valid CREG pattern"));

static CPAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CPAS: ([0-9]+)$").expect("valid CPAS pattern"));

static COPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\+COPS: [0-9]+,[0-9]+,"([^"]*)""#).expect("valid COPS pattern")
});

static CCLK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\+CCLK: "([^"]+)"$"#).expect("valid CCLK pattern"));

static MODEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{2})/([0-9]{2})/([0-9]{2}),([0-9]{2}):([0-9]{2}):([0-9]{2})([+-][0-9]{1,2})?$")
        .expect("valid timestamp pattern")
});

/// Format used for normalized timestamps
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Split a response line into comma separated fields, honoring and
/// stripping double quotes. Empty fields are kept.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse a modem timestamp `YY/MM/DD,HH:MM:SS±ZZ`.
///
/// The century is always taken as 20xx. The zone offset is accepted but not
/// applied; the result is modem-local time.
pub fn parse_modem_time(text: &str) -> ModemResult<NaiveDateTime> {
    let caps = MODEM_TIME
        .captures(text)
        .ok_or_else(|| ModemError::parse("timestamp", text))?;

    let normalized = format!(
        "20{}-{}-{} {}:{}:{}",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]
    );
    NaiveDateTime::parse_from_str(&normalized, DATE_FORMAT)
        .map_err(|_| ModemError::parse("timestamp", text))
}

/// Format a timestamp the way `AT+CCLK` expects it, with a zero zone offset
pub fn format_modem_time(time: &NaiveDateTime) -> String {
    time.format("%y/%m/%d,%H:%M:%S+00").to_string()
}

/// Find the line starting with `prefix`, or fail with the first line seen
fn find_line<'a>(lines: &'a [String], prefix: &str, what: &'static str) -> ModemResult<&'a str> {
    lines
        .iter()
        .find(|l| l.starts_with(prefix))
        .map(String::as_str)
        .ok_or_else(|| ModemError::parse(what, lines.first().cloned().unwrap_or_default()))
}

fn number<T: std::str::FromStr>(text: &str, what: &'static str, line: &str) -> ModemResult<T> {
    text.parse().map_err(|_| ModemError::parse(what, line))
}

/// First response line, e.g. the IMEI for `AT+GSN`
pub fn parse_first_line(lines: &[String], what: &'static str) -> ModemResult<String> {
    lines
        .first()
        .filter(|l| !l.is_empty())
        .cloned()
        .ok_or_else(|| ModemError::parse(what, ""))
}

/// Map a raw RSSI value to 0-5 bars. 99 means unknown.
pub fn signal_bars(rssi: u32) -> u8 {
    match rssi {
        99 => 0,
        15.. => 5,
        12.. => 4,
        9.. => 3,
        6.. => 2,
        _ => 1,
    }
}

/// Decode `+CSQ: <rssi>,<ber>` into 0-5 bars
pub fn parse_signal_level(lines: &[String]) -> ModemResult<u8> {
    let line = find_line(lines, "+CSQ:", "signal quality")?;
    let caps = CSQ
        .captures(line)
        .ok_or_else(|| ModemError::parse("signal quality", line))?;
    let rssi: u32 = number(&caps[1], "signal quality", line)?;
    Ok(signal_bars(rssi))
}

/// Network registration state (`+CREG`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Not registered, not searching
    Unregistered,
    /// Registered on the home network
    Home,
    /// Searching for an operator
    Searching,
    /// Registration denied
    Denied,
    /// Unknown
    Unknown,
    /// Registered, roaming
    Roaming,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unregistered => "not registered",
            Self::Home => "registered (home)",
            Self::Searching => "searching",
            Self::Denied => "denied",
            Self::Unknown => "unknown",
            Self::Roaming => "registered (roaming)",
        };
        f.write_str(text)
    }
}

/// Decode `+CREG: <n>,<stat>`
pub fn parse_registration(lines: &[String]) -> ModemResult<RegistrationStatus> {
    let line = find_line(lines, "+CREG:", "registration status")?;
    let caps = CREG
        .captures(line)
        .ok_or_else(|| ModemError::parse("registration status", line))?;
    match &caps[2] {
        "0" => Ok(RegistrationStatus::Unregistered),
        "1" => Ok(RegistrationStatus::Home),
        "2" => Ok(RegistrationStatus::Searching),
        "3" => Ok(RegistrationStatus::Denied),
        "4" => Ok(RegistrationStatus::Unknown),
        "5" => Ok(RegistrationStatus::Roaming),
        _ => Err(ModemError::parse("registration status", line)),
    }
}

/// Module activity (`+CPAS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    /// Ready to accept commands
    Ready,
    /// Unknown
    Unknown,
    /// Incoming call ringing
    Ringing,
    /// Call in progress
    CallInProgress,
    /// Any other code
    NotAvailable,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ready => "ready",
            Self::Unknown => "unknown",
            Self::Ringing => "ringing",
            Self::CallInProgress => "call in progress",
            Self::NotAvailable => "not available",
        };
        f.write_str(text)
    }
}

/// Decode `+CPAS: <n>`
pub fn parse_module_status(lines: &[String]) -> ModemResult<ModuleStatus> {
    let line = find_line(lines, "+CPAS:", "module status")?;
    let caps = CPAS
        .captures(line)
        .ok_or_else(|| ModemError::parse("module status", line))?;
    Ok(match &caps[1] {
        "0" => ModuleStatus::Ready,
        "2" => ModuleStatus::Unknown,
        "3" => ModuleStatus::Ringing,
        "4" => ModuleStatus::CallInProgress,
        _ => ModuleStatus::NotAvailable,
    })
}

/// Decode `+COPS: <mode>,<format>,"<name>"`
pub fn parse_operator(lines: &[String]) -> ModemResult<String> {
    let line = find_line(lines, "+COPS:", "operator")?;
    let caps = COPS
        .captures(line)
        .ok_or_else(|| ModemError::parse("operator", line))?;
    Ok(caps[1].to_string())
}

/// SIM lock state (`+CPIN`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinStatus {
    /// No PIN required
    Ready,
    /// Waiting for SIM PIN
    SimPin,
    /// Waiting for SIM PUK
    SimPuk,
    /// Waiting for phone-to-SIM password
    PhSimPin,
    /// Waiting for SIM PIN2
    SimPin2,
    /// Waiting for SIM PUK2
    SimPuk2,
    /// Anything else the modem reports
    Other(String),
}

/// Decode `+CPIN: <code>`
pub fn parse_pin_status(lines: &[String]) -> ModemResult<PinStatus> {
    let line = find_line(lines, "+CPIN:", "pin status")?;
    let code = line.trim_start_matches("+CPIN:").trim();
    Ok(match code {
        "READY" => PinStatus::Ready,
        "SIM PIN" => PinStatus::SimPin,
        "SIM PUK" => PinStatus::SimPuk,
        "PH_SIM PIN" => PinStatus::PhSimPin,
        "SIM PIN2" => PinStatus::SimPin2,
        "SIM PUK2" => PinStatus::SimPuk2,
        "" => return Err(ModemError::parse("pin status", line)),
        other => PinStatus::Other(other.to_string()),
    })
}

/// Decode `+CCLK: "<YY/MM/DD,HH:MM:SS±ZZ>"`
pub fn parse_clock(lines: &[String]) -> ModemResult<NaiveDateTime> {
    let line = find_line(lines, "+CCLK:", "clock")?;
    let caps = CCLK
        .captures(line)
        .ok_or_else(|| ModemError::parse("clock", line))?;
    parse_modem_time(&caps[1])
}
