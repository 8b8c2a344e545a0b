//! The modem engine task
//!
//! One tokio task owns the byte stream, the [`LineFramer`] and the
//! [`CommandSession`]. It waits on three things: a submitted command, the
//! next framed line, and (only when a command timeout is configured) the
//! pending command's deadline. Clients reach it through an `mpsc` channel,
//! so the session slot and the write half have a single owner.

use super::error::ModemError;
use super::event::{EventBus, ModemEvent};
use super::framer::LineFramer;
use super::logger::SharedTranscript;
use super::session::{CommandSession, LineOutcome, Responder};
use super::transport::{ModemIo, TransportError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::FramedRead;

/// Requests handled by the engine task
pub(crate) enum EngineCommand {
    /// Send a command and answer `responder` when it terminates
    Submit {
        /// Command text without `\r`
        text: String,
        /// Completion handle
        responder: Responder,
    },
    /// Dispatch a locally produced event in line with modem notifications
    Emit(ModemEvent),
}

/// Engine tuning
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Reject a pending command after this long without a terminal token.
    /// `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Discard lines longer than this many bytes. `None` is unbounded.
    pub max_line_len: Option<usize>,
}

/// Spawn the engine over `io`
pub(crate) fn spawn<T: ModemIo>(
    io: T,
    config: EngineConfig,
    events: Arc<EventBus>,
    transcript: Option<SharedTranscript>,
) -> (mpsc::Sender<EngineCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let handle = tokio::spawn(run(io, config, cmd_rx, events, transcript));
    (cmd_tx, handle)
}

async fn run<T: ModemIo>(
    io: T,
    config: EngineConfig,
    mut cmd_rx: mpsc::Receiver<EngineCommand>,
    events: Arc<EventBus>,
    transcript: Option<SharedTranscript>,
) {
    let (reader, mut writer) = tokio::io::split(io);
    let framer = config
        .max_line_len
        .map_or_else(LineFramer::new, LineFramer::with_max_len);
    let mut lines = FramedRead::new(reader, framer);
    let mut session = CommandSession::new();

    tracing::info!("Modem engine started");

    loop {
        let deadline = config
            .command_timeout
            .zip(session.pending())
            .map(|(timeout, pending)| Instant::from_std(pending.started()) + timeout);

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let (text, responder) = match cmd {
                    Some(EngineCommand::Submit { text, responder }) => (text, responder),
                    Some(EngineCommand::Emit(event)) => {
                        events.emit(&event);
                        continue;
                    }
                    None => {
                        tracing::debug!("All clients dropped");
                        break;
                    }
                };
                let Some(wire) = session.submit(text.clone(), responder) else {
                    continue;
                };
                tracing::debug!("> {}", text);
                if let Some(ref transcript) = transcript {
                    transcript.lock().log_tx(&text);
                }
                if let Err(e) = write_command(&mut writer, wire.as_bytes()).await {
                    tracing::error!("Failed to write {:?}: {}", text, e);
                    session.abort(ModemError::Transport(TransportError::Io(e)));
                }
            }

            line = lines.next() => match line {
                Some(Ok(line)) => {
                    handle_line(&mut session, &events, transcript.as_ref(), &line);
                }
                Some(Err(e)) => {
                    tracing::error!("Read failed: {}", e);
                    session.abort(ModemError::Transport(TransportError::Io(e)));
                    break;
                }
                None => {
                    tracing::info!("Modem stream closed");
                    break;
                }
            },

            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(timeout) = config.command_timeout {
                    if let Some(command) = session.expire(timeout) {
                        tracing::warn!("{:?} got no terminal token within {:?}", command, timeout);
                    }
                }
            }
        }
    }

    session.abort(ModemError::SessionClosed);
    tracing::info!("Modem engine stopped");
}

async fn write_command<W: AsyncWrite + Unpin>(writer: &mut W, wire: &[u8]) -> std::io::Result<()> {
    writer.write_all(wire).await?;
    writer.flush().await
}

fn handle_line(
    session: &mut CommandSession,
    events: &EventBus,
    transcript: Option<&SharedTranscript>,
    line: &str,
) {
    if line.is_empty() {
        return;
    }
    tracing::debug!("< {}", line);
    if let Some(transcript) = transcript {
        transcript.lock().log_rx(line);
    }

    match session.on_line(line) {
        LineOutcome::Event(event) => events.emit(&event),
        LineOutcome::Unrecognized(line) => {
            tracing::warn!("Dropping unsolicited line {:?}", line);
            events.emit_unrecognized(&line);
        }
        LineOutcome::Resolved { command, lines } => {
            tracing::debug!("{:?} completed with {} line(s)", command, lines);
        }
        LineOutcome::Rejected { command, message } => {
            tracing::debug!("{:?} failed: {}", command, message);
        }
        LineOutcome::Empty | LineOutcome::Echo | LineOutcome::Accumulated => {}
    }
}
