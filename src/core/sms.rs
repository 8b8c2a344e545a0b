//! SMS records decoded from `+CMGL` / `+CMGR` responses

use super::codec::decode_ucs2;
use super::error::{ModemError, ModemResult};
use super::response::{parse_modem_time, split_fields, DATE_FORMAT};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const LIST_PREFIX: &str = "+CMGL:";
const READ_PREFIX: &str = "+CMGR:";

/// A stored text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sms {
    id: u32,
    status: String,
    from: String,
    date: NaiveDateTime,
    message: String,
}

impl Sms {
    /// Storage index (1-based)
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Storage status, e.g. `REC UNREAD`
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Sender address
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Service centre timestamp, modem-local
    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Timestamp as `YYYY-MM-DD HH:MM:SS`
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Message text
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Decode one message from its header and body lines.
///
/// `+CMGL` headers carry their own index; `+CMGR` headers do not, so `id`
/// must be supplied for them.
pub fn parse_sms(head: &str, body: &str, id: Option<u32>) -> ModemResult<Sms> {
    let fields = split_fields(head);

    let (id, status, from, date) = if let Some(rest) = head.strip_prefix(LIST_PREFIX) {
        if fields.len() < 5 {
            return Err(ModemError::parse("sms header", head));
        }
        let index = rest
            .split(',')
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| ModemError::parse("sms index", head))?;
        (index, fields[1].as_str(), &fields[2], &fields[4])
    } else if head.starts_with(READ_PREFIX) {
        if fields.len() < 4 {
            return Err(ModemError::parse("sms header", head));
        }
        let id = id.ok_or_else(|| ModemError::parse("sms index", head))?;
        let status = fields[0].trim_start_matches(READ_PREFIX).trim();
        (id, status, &fields[1], &fields[3])
    } else {
        return Err(ModemError::parse("sms", head));
    };

    Ok(Sms {
        id,
        status: status.to_string(),
        from: decode_ucs2(from),
        date: parse_modem_time(date)?,
        message: decode_ucs2(body),
    })
}

/// Decode every message in an `AT+CMGL` response.
///
/// Each `+CMGL:` line is paired with the line that follows it.
pub fn parse_sms_list(lines: &[String]) -> ModemResult<Vec<Sms>> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with(LIST_PREFIX))
        .map(|(idx, head)| {
            let body = lines
                .get(idx + 1)
                .ok_or_else(|| ModemError::parse("sms body", head.as_str()))?;
            parse_sms(head, body, None)
        })
        .collect()
}

/// Decode an `AT+CMGR=<id>` response
pub fn parse_sms_read(lines: &[String], id: u32) -> ModemResult<Sms> {
    match lines {
        [head, body, ..] => parse_sms(head, body, Some(id)),
        [head] => Err(ModemError::parse("sms body", head.as_str())),
        [] => Err(ModemError::parse("sms", "")),
    }
}
