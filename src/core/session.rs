//! Command/response correlation
//!
//! [`CommandSession`] owns the single in-flight command slot. It is a plain
//! state machine: the engine feeds it submissions and framed lines and acts
//! on the returned outcomes (write bytes, dispatch events). Resolution goes
//! through a `oneshot` sender that is moved out of the slot before it is
//! used, so a command can be answered at most once.

use super::classifier::classify;
use super::error::ModemError;
use super::event::ModemEvent;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Raw outcome of one command: the lines between echo and terminal token
pub type CommandResult = Result<Vec<String>, ModemError>;

/// Completion handle for a submitted command
pub type Responder = oneshot::Sender<CommandResult>;

const CME_ERROR: &str = "+CME ERROR";
const CMS_ERROR: &str = "+CMS ERROR";

/// The command currently awaiting its terminal token
#[derive(Debug)]
pub struct PendingCommand {
    text: String,
    lines: Vec<String>,
    responder: Responder,
    started: Instant,
}

impl PendingCommand {
    /// Command text as sent, without the trailing `\r`
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lines accumulated so far
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// When the command was written
    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Session state
#[derive(Debug, Default)]
pub enum SessionState {
    /// No command in flight
    #[default]
    Idle,
    /// A command was sent and no terminal token has been seen
    AwaitingResponse(PendingCommand),
}

/// What the session did with a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line, ignored
    Empty,
    /// Echo of the pending command, discarded
    Echo,
    /// `OK`: the pending command was resolved
    Resolved {
        /// Command text
        command: String,
        /// Number of lines handed to the caller
        lines: usize,
    },
    /// `ERROR` / `+CME ERROR` / `+CMS ERROR`: the pending command was rejected
    Rejected {
        /// Command text
        command: String,
        /// Diagnostic message
        message: String,
    },
    /// Unsolicited notification, to be dispatched
    Event(ModemEvent),
    /// Appended to the pending command's result buffer
    Accumulated,
    /// Not a notification and no command pending; dropped
    Unrecognized(String),
}

/// Single-slot command/response state machine
#[derive(Debug, Default)]
pub struct CommandSession {
    state: SessionState,
}

impl CommandSession {
    /// Create an idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True when no command is in flight
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    /// The in-flight command, if any
    pub fn pending(&self) -> Option<&PendingCommand> {
        match &self.state {
            SessionState::AwaitingResponse(pending) => Some(pending),
            SessionState::Idle => None,
        }
    }

    /// Start a command.
    ///
    /// When idle, stores the command and returns the exact text to write
    /// (`command + "\r"`). When busy, the existing command is left untouched
    /// and `responder` is failed immediately with [`ModemError::Busy`].
    pub fn submit(&mut self, text: String, responder: Responder) -> Option<String> {
        if let SessionState::AwaitingResponse(pending) = &self.state {
            tracing::warn!(
                "Rejecting {:?}: {:?} still in progress",
                text,
                pending.text
            );
            let _ = responder.send(Err(ModemError::Busy {
                pending: pending.text.clone(),
            }));
            return None;
        }

        let wire = format!("{text}\r");
        self.state = SessionState::AwaitingResponse(PendingCommand {
            text,
            lines: Vec::new(),
            responder,
            started: Instant::now(),
        });
        Some(wire)
    }

    /// Process one framed line
    pub fn on_line(&mut self, line: &str) -> LineOutcome {
        let SessionState::AwaitingResponse(pending) = &mut self.state else {
            return match classify(line) {
                Some(event) => LineOutcome::Event(event),
                None if line.is_empty() => LineOutcome::Empty,
                None => LineOutcome::Unrecognized(line.to_string()),
            };
        };

        if line == pending.text {
            return LineOutcome::Echo;
        }

        if line == "OK" {
            let pending = self.take_pending();
            let command = pending.text;
            let lines = pending.lines.len();
            let _ = pending.responder.send(Ok(pending.lines));
            return LineOutcome::Resolved { command, lines };
        }

        if let Some(message) = failure_message(line) {
            let pending = self.take_pending();
            let _ = pending
                .responder
                .send(Err(ModemError::CommandFailed(message.clone())));
            return LineOutcome::Rejected {
                command: pending.text,
                message,
            };
        }

        if let Some(event) = classify(line) {
            return LineOutcome::Event(event);
        }

        if line.is_empty() {
            return LineOutcome::Empty;
        }

        pending.lines.push(line.to_string());
        LineOutcome::Accumulated
    }

    /// Fail the pending command with `error` and return to idle.
    ///
    /// Returns the command text, or `None` if nothing was pending.
    pub fn abort(&mut self, error: ModemError) -> Option<String> {
        if self.is_idle() {
            return None;
        }
        let pending = self.take_pending();
        let _ = pending.responder.send(Err(error));
        Some(pending.text)
    }

    /// Fail the pending command with a timeout if it has been outstanding
    /// for at least `after`. Returns the expired command text.
    pub fn expire(&mut self, after: Duration) -> Option<String> {
        let pending = self.pending()?;
        if pending.started.elapsed() < after {
            return None;
        }
        let command = pending.text.clone();
        self.abort(ModemError::Timeout {
            command,
            after,
        })
    }

    fn take_pending(&mut self) -> PendingCommand {
        match std::mem::take(&mut self.state) {
            SessionState::AwaitingResponse(pending) => pending,
            SessionState::Idle => unreachable!("take_pending called while idle"),
        }
    }
}

/// Diagnostic text of a failure terminal token, `None` for any other line
fn failure_message(line: &str) -> Option<String> {
    if line == "ERROR" {
        return Some(line.to_string());
    }
    [CME_ERROR, CMS_ERROR].iter().find_map(|prefix| {
        line.strip_prefix(prefix).map(|rest| {
            let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
            if rest.is_empty() {
                line.to_string()
            } else {
                rest.to_string()
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    fn submit(session: &mut CommandSession, text: &str) -> (Option<String>, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        (session.submit(text.to_string(), tx), rx)
    }

    #[test]
    fn test_submit_when_idle_writes_command() {
        let mut session = CommandSession::new();
        let (wire, mut rx) = submit(&mut session, "AT+CSQ");

        assert_eq!(wire.as_deref(), Some("AT+CSQ\r"));
        assert_eq!(session.pending().map(PendingCommand::text), Some("AT+CSQ"));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_second_submit_is_rejected_busy() {
        let mut session = CommandSession::new();
        let (_, mut first) = submit(&mut session, "AT+CMGL=\"ALL\"");
        assert_eq!(session.on_line("+CMGL: 1"), LineOutcome::Accumulated);

        let (wire, mut second) = submit(&mut session, "AT+CSQ");
        assert!(wire.is_none());
        match second.try_recv() {
            Ok(Err(ModemError::Busy { pending })) => assert_eq!(pending, "AT+CMGL=\"ALL\""),
            other => panic!("unexpected: {other:?}"),
        }

        let pending = session.pending().unwrap();
        assert_eq!(pending.text(), "AT+CMGL=\"ALL\"");
        assert_eq!(pending.lines(), ["+CMGL: 1"]);
        assert!(matches!(first.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_echo_is_discarded() {
        let mut session = CommandSession::new();
        let (_, _rx) = submit(&mut session, "AT+GSN");

        assert_eq!(session.on_line("AT+GSN"), LineOutcome::Echo);
        assert!(session.pending().unwrap().lines().is_empty());
        assert!(!session.is_idle());
    }

    #[test]
    fn test_ok_resolves_with_lines_in_order() {
        let mut session = CommandSession::new();
        let (_, mut rx) = submit(&mut session, "AT+CMGR=1");

        session.on_line("AT+CMGR=1");
        session.on_line("+CMGR: \"REC READ\",\"0031\",,\"23/01/05,14:03:21+00\"");
        session.on_line("");
        session.on_line("0041");
        let outcome = session.on_line("OK");

        assert_eq!(
            outcome,
            LineOutcome::Resolved {
                command: "AT+CMGR=1".into(),
                lines: 2
            }
        );
        assert!(session.is_idle());
        assert_eq!(
            rx.try_recv().unwrap().unwrap(),
            vec![
                "+CMGR: \"REC READ\",\"0031\",,\"23/01/05,14:03:21+00\"".to_string(),
                "0041".to_string()
            ]
        );
    }

    #[test]
    fn test_error_rejects() {
        let mut session = CommandSession::new();
        let (_, mut rx) = submit(&mut session, "ATD123;");

        assert_eq!(
            session.on_line("ERROR"),
            LineOutcome::Rejected {
                command: "ATD123;".into(),
                message: "ERROR".into()
            }
        );
        assert!(session.is_idle());
        assert!(matches!(rx.try_recv(), Ok(Err(ModemError::CommandFailed(m))) if m == "ERROR"));
    }

    #[test]
    fn test_cme_error_message_is_stripped() {
        let mut session = CommandSession::new();
        let (_, mut rx) = submit(&mut session, "AT+CPIN=0000");

        session.on_line("+CME ERROR: foo ");
        assert!(session.is_idle());
        assert!(matches!(rx.try_recv(), Ok(Err(ModemError::CommandFailed(m))) if m == "foo"));
    }

    #[test]
    fn test_cms_error_is_terminal() {
        let mut session = CommandSession::new();
        let (_, mut rx) = submit(&mut session, "AT+CMGR=99");

        session.on_line("+CMS ERROR: invalid memory index");
        assert!(matches!(
            rx.try_recv(),
            Ok(Err(ModemError::CommandFailed(m))) if m == "invalid memory index"
        ));
    }

    #[test]
    fn test_notification_while_pending_is_not_buffered() {
        let mut session = CommandSession::new();
        let (_, mut rx) = submit(&mut session, "AT+CSQ");

        assert_eq!(
            session.on_line("+CMTI: \"SM\",7"),
            LineOutcome::Event(ModemEvent::NewSms { index: 7 })
        );
        assert_eq!(session.on_line("RING"), LineOutcome::Event(ModemEvent::Ring { number: None }));
        session.on_line("+CSQ: 14,0");
        session.on_line("OK");

        assert_eq!(rx.try_recv().unwrap().unwrap(), vec!["+CSQ: 14,0".to_string()]);
    }

    #[test]
    fn test_echo_checked_before_notifications() {
        let mut session = CommandSession::new();
        let (_, _rx) = submit(&mut session, "RING");
        assert_eq!(session.on_line("RING"), LineOutcome::Echo);
    }

    #[test]
    fn test_idle_lines() {
        let mut session = CommandSession::new();
        assert_eq!(
            session.on_line("+CLIP: \"+15551234567\",145"),
            LineOutcome::Event(ModemEvent::Ring {
                number: Some("+15551234567".into())
            })
        );
        assert_eq!(session.on_line(""), LineOutcome::Empty);
        assert_eq!(session.on_line("OK"), LineOutcome::Unrecognized("OK".into()));
        assert_eq!(
            session.on_line("+CUSD: 0"),
            LineOutcome::Unrecognized("+CUSD: 0".into())
        );
    }

    #[test]
    fn test_session_reusable_after_resolution() {
        let mut session = CommandSession::new();
        let (_, _rx) = submit(&mut session, "AT");
        session.on_line("OK");

        let (wire, _rx) = submit(&mut session, "ATA");
        assert_eq!(wire.as_deref(), Some("ATA\r"));
    }

    #[test]
    fn test_abort_and_expire() {
        let mut session = CommandSession::new();
        assert_eq!(session.abort(ModemError::SessionClosed), None);

        let (_, mut rx) = submit(&mut session, "AT+CPOWD=1");
        assert_eq!(session.expire(Duration::from_secs(3600)), None);
        assert_eq!(session.expire(Duration::ZERO).as_deref(), Some("AT+CPOWD=1"));
        assert!(session.is_idle());
        assert!(matches!(rx.try_recv(), Ok(Err(ModemError::Timeout { .. }))));
    }

    #[test]
    fn test_dropped_caller_does_not_break_session() {
        let mut session = CommandSession::new();
        let (_, rx) = submit(&mut session, "AT");
        drop(rx);
        assert!(matches!(session.on_line("OK"), LineOutcome::Resolved { .. }));
        assert!(session.is_idle());
    }
}
