//! Classification of unsolicited modem lines

use super::event::{HangUpReason, ModemEvent};
use regex::Regex;
use std::sync::LazyLock;

static CLIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\+CLIP: "([0-9+]+)""#).expect("valid CLIP pattern"));

static CMTI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\+CMTI: "SM",([0-9]+)$"#).expect("valid CMTI pattern"));

/// Map a line to the event it announces, or `None` if it is not a notification.
///
/// Pure: the same line always yields an equal result.
pub fn classify(line: &str) -> Option<ModemEvent> {
    let event = match line {
        "RING" => ModemEvent::Ring { number: None },
        "BUSY" => hang_up(HangUpReason::Busy),
        "NO CARRIER" => hang_up(HangUpReason::NoCarrier),
        "NO ANSWER" => hang_up(HangUpReason::NoAnswer),
        "NO DIALTONE" => hang_up(HangUpReason::NoDialtone),
        "CONNECT" => ModemEvent::common("CONNECT"),
        "Call Ready" => ModemEvent::common("CALL READY"),
        "SMS Ready" => ModemEvent::common("SMS READY"),
        "NORMAL POWER DOWN" => ModemEvent::common("POWER DOWN"),
        _ => return classify_pattern(line),
    };
    Some(event)
}

fn classify_pattern(line: &str) -> Option<ModemEvent> {
    if let Some(caps) = CLIP.captures(line) {
        return Some(ModemEvent::Ring {
            number: Some(caps[1].to_string()),
        });
    }
    if let Some(caps) = CMTI.captures(line) {
        // Indexes that overflow u32 are not notifications
        if let Ok(index) = caps[1].parse() {
            return Some(ModemEvent::NewSms { index });
        }
    }
    None
}

fn hang_up(reason: HangUpReason) -> ModemEvent {
    ModemEvent::HangUp {
        reason: Some(reason),
    }
}

/// True if `line` is an unsolicited notification
pub fn is_notification(line: &str) -> bool {
    classify(line).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_without_number() {
        assert_eq!(classify("RING"), Some(ModemEvent::Ring { number: None }));
    }

    #[test]
    fn test_clip_carries_number() {
        assert_eq!(
            classify(r#"+CLIP: "+15551234567",145,"",0,"",0"#),
            Some(ModemEvent::Ring {
                number: Some("+15551234567".into())
            })
        );
        assert_eq!(
            classify(r#"+CLIP: "+15551234567""#),
            Some(ModemEvent::Ring {
                number: Some("+15551234567".into())
            })
        );
    }

    #[test]
    fn test_clip_without_digits_is_not_a_notification() {
        assert_eq!(classify(r#"+CLIP: "",128"#), None);
    }

    #[test]
    fn test_cmti() {
        assert_eq!(
            classify(r#"+CMTI: "SM",7"#),
            Some(ModemEvent::NewSms { index: 7 })
        );
        assert_eq!(classify(r#"+CMTI: "ME",7"#), None);
        assert_eq!(classify(r#"+CMTI: "SM",7,1"#), None);
        assert_eq!(classify(r#"+CMTI: "SM",99999999999999999999"#), None);
    }

    #[test]
    fn test_hang_up_reasons() {
        for (line, reason) in [
            ("BUSY", HangUpReason::Busy),
            ("NO CARRIER", HangUpReason::NoCarrier),
            ("NO ANSWER", HangUpReason::NoAnswer),
            ("NO DIALTONE", HangUpReason::NoDialtone),
        ] {
            assert_eq!(
                classify(line),
                Some(ModemEvent::HangUp {
                    reason: Some(reason)
                })
            );
        }
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(classify("Call Ready"), Some(ModemEvent::common("CALL READY")));
        assert_eq!(classify("SMS Ready"), Some(ModemEvent::common("SMS READY")));
        assert_eq!(
            classify("NORMAL POWER DOWN"),
            Some(ModemEvent::common("POWER DOWN"))
        );
        assert_eq!(classify("CONNECT"), Some(ModemEvent::common("CONNECT")));
    }

    #[test]
    fn test_responses_are_not_notifications() {
        for line in ["OK", "ERROR", "+CSQ: 14,0", "123456789012345", "", "ring"] {
            assert!(!is_notification(line), "{line:?}");
        }
    }

    #[test]
    fn test_classification_is_stable() {
        for line in ["RING", r#"+CMTI: "SM",3"#, r#"+CLIP: "123""#, "BUSY", "junk"] {
            assert_eq!(classify(line), classify(line));
        }
    }
}
