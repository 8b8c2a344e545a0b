//! Public command surface of the modem
//!
//! Every operation builds one AT command, submits it to the engine and
//! decodes the lines it returns. Only one command may be in flight: a call
//! made while another is pending fails immediately with
//! [`ModemError::Busy`]; callers serialize their own operations.

use super::engine::{self, EngineCommand, EngineConfig};
use super::error::{ModemError, ModemResult};
use super::event::{EventBus, EventKind, HangUpReason, ListenerId, ModemEvent};
use super::logger::SharedTranscript;
use super::response::{
    format_modem_time, parse_clock, parse_first_line, parse_module_status, parse_operator,
    parse_pin_status, parse_registration, parse_signal_level, ModuleStatus, PinStatus,
    RegistrationStatus,
};
use super::sms::{parse_sms_list, parse_sms_read, Sms};
use super::transport::{open_serial, ModemIo, SerialConfig};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Commands sent by [`ModemClient::init`] unless overridden
pub const DEFAULT_INIT_COMMANDS: &[&str] = &[
    "AT",
    "AT+CMEE=2",
    "AT+CMGF=1",
    "AT+CSCS=\"UCS2\"",
    "AT+CLIP=1",
];

/// `AT+CPOWD` mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDownMode {
    /// Power off immediately
    Urgent,
    /// Detach from the network first
    Normal,
}

impl PowerDownMode {
    fn code(self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::Normal => 1,
        }
    }
}

/// Handle to a running modem engine. Cheap to clone.
#[derive(Clone)]
pub struct ModemClient {
    cmd_tx: mpsc::Sender<EngineCommand>,
    events: Arc<EventBus>,
    init_commands: Arc<Vec<String>>,
}

impl ModemClient {
    /// Start an engine over any duplex byte stream
    pub fn spawn<T: ModemIo>(io: T, config: EngineConfig) -> (Self, JoinHandle<()>) {
        Self::spawn_with_transcript(io, config, None)
    }

    /// Start an engine that records its traffic to `transcript`
    pub fn spawn_with_transcript<T: ModemIo>(
        io: T,
        config: EngineConfig,
        transcript: Option<SharedTranscript>,
    ) -> (Self, JoinHandle<()>) {
        let events = Arc::new(EventBus::new());
        let (cmd_tx, handle) = engine::spawn(io, config, Arc::clone(&events), transcript);
        let client = Self {
            cmd_tx,
            events,
            init_commands: Arc::new(DEFAULT_INIT_COMMANDS.iter().map(|c| c.to_string()).collect()),
        };
        (client, handle)
    }

    /// Open a serial port and start an engine over it
    pub fn open(serial: &SerialConfig, config: EngineConfig) -> ModemResult<(Self, JoinHandle<()>)> {
        let stream = open_serial(serial)?;
        tracing::info!("Opened {}", serial.describe());
        Ok(Self::spawn(stream, config))
    }

    /// Replace the sequence sent by [`init`](Self::init)
    #[must_use]
    pub fn with_init_commands(mut self, commands: Vec<String>) -> Self {
        self.init_commands = Arc::new(commands);
        self
    }

    /// Event bus of this modem
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Register a listener for one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ModemEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<ModemEvent> {
        self.events.subscribe()
    }

    /// True once the engine task has stopped
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    /// Send a raw command and return the lines between echo and `OK`
    pub async fn command(&self, text: impl Into<String>) -> ModemResult<Vec<String>> {
        let (responder, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCommand::Submit {
                text: text.into(),
                responder,
            })
            .await
            .map_err(|_| ModemError::SessionClosed)?;
        rx.await.map_err(|_| ModemError::SessionClosed)?
    }

    async fn execute(&self, text: impl Into<String>) -> ModemResult<()> {
        self.command(text).await.map(drop)
    }

    /// Run the initialization sequence, stopping at the first failure
    pub async fn init(&self) -> ModemResult<()> {
        for command in self.init_commands.iter() {
            self.execute(command.as_str()).await?;
        }
        tracing::info!("Modem initialized");
        Ok(())
    }

    /// Start a voice call
    pub async fn dial(&self, number: &str) -> ModemResult<()> {
        let valid = !number.is_empty()
            && number
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'));
        if !valid {
            return Err(ModemError::InvalidArgument(format!(
                "not a dialable number: {number:?}"
            )));
        }
        self.execute(format!("ATD{number};")).await
    }

    /// Answer an incoming call
    pub async fn answer(&self) -> ModemResult<()> {
        self.execute("ATA").await
    }

    /// Hang up the current call.
    ///
    /// On success a [`ModemEvent::HangUp`] with [`HangUpReason::Local`] is
    /// dispatched from the engine task, ordered with the modem's own
    /// notifications.
    pub async fn hang_up(&self) -> ModemResult<()> {
        self.execute("ATH0").await?;
        self.cmd_tx
            .send(EngineCommand::Emit(ModemEvent::HangUp {
                reason: Some(HangUpReason::Local),
            }))
            .await
            .map_err(|_| ModemError::SessionClosed)
    }

    /// All stored messages
    pub async fn list_sms(&self) -> ModemResult<Vec<Sms>> {
        let lines = self.command("AT+CMGL=\"ALL\"").await?;
        parse_sms_list(&lines)
    }

    /// Message stored at `id`
    pub async fn read_sms(&self, id: u32) -> ModemResult<Sms> {
        let lines = self.command(format!("AT+CMGR={id}")).await?;
        parse_sms_read(&lines, id)
    }

    /// Delete the message stored at `id`
    pub async fn delete_sms(&self, id: u32) -> ModemResult<()> {
        self.execute(format!("AT+CMGD={id}")).await
    }

    /// Delete every stored message
    pub async fn delete_all_sms(&self) -> ModemResult<()> {
        self.execute("AT+CMGDA=\"DEL ALL\"").await
    }

    /// Module IMEI
    pub async fn imei(&self) -> ModemResult<String> {
        let lines = self.command("AT+GSN").await?;
        parse_first_line(&lines, "IMEI")
    }

    /// Unlock the SIM
    pub async fn enter_pin(&self, pin: &str) -> ModemResult<()> {
        validate_pin(pin)?;
        self.execute(format!("AT+CPIN={pin}")).await
    }

    /// SIM lock state
    pub async fn pin_status(&self) -> ModemResult<PinStatus> {
        let lines = self.command("AT+CPIN?").await?;
        parse_pin_status(&lines)
    }

    /// Change the SIM PIN
    pub async fn change_pin(&self, old: &str, new: &str) -> ModemResult<()> {
        validate_pin(old)?;
        validate_pin(new)?;
        self.execute(format!("AT+CPWD=\"SC\",\"{old}\",\"{new}\"")).await
    }

    /// Set the modem clock.
    ///
    /// Written year first as `AT+CCLK="YY/MM/DD,HH:MM:SS+00"`, the field
    /// order the modem reports and [`clock`](Self::clock) parses, not the
    /// day-first order. The zone offset is always `+00`.
    pub async fn set_clock(&self, time: &NaiveDateTime) -> ModemResult<()> {
        self.execute(format!("AT+CCLK=\"{}\"", format_modem_time(time)))
            .await
    }

    /// Read the modem clock
    pub async fn clock(&self) -> ModemResult<NaiveDateTime> {
        let lines = self.command("AT+CCLK?").await?;
        parse_clock(&lines)
    }

    /// Full functionality with reset
    pub async fn reboot(&self) -> ModemResult<()> {
        self.execute("AT+CFUN=1,1").await
    }

    /// Power the module off.
    ///
    /// Many modules answer with `NORMAL POWER DOWN` instead of `OK`; that
    /// line is dispatched as an event and this call then only completes if a
    /// command timeout is configured.
    pub async fn power_down(&self, mode: PowerDownMode) -> ModemResult<()> {
        self.execute(format!("AT+CPOWD={}", mode.code())).await
    }

    /// Signal strength in bars, 0 (none/unknown) to 5
    pub async fn signal_level(&self) -> ModemResult<u8> {
        let lines = self.command("AT+CSQ").await?;
        parse_signal_level(&lines)
    }

    /// Network registration state
    pub async fn registration(&self) -> ModemResult<RegistrationStatus> {
        let lines = self.command("AT+CREG?").await?;
        parse_registration(&lines)
    }

    /// Module activity state
    pub async fn module_status(&self) -> ModemResult<ModuleStatus> {
        let lines = self.command("AT+CPAS").await?;
        parse_module_status(&lines)
    }

    /// Name of the current operator
    pub async fn operator(&self) -> ModemResult<String> {
        let lines = self.command("AT+COPS?").await?;
        parse_operator(&lines)
    }
}

fn validate_pin(pin: &str) -> ModemResult<()> {
    if (4..=8).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ModemError::InvalidArgument(
            "PIN must be 4 to 8 digits".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("12345678").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("1234\r").is_err());
    }

    #[test]
    fn test_power_down_codes() {
        assert_eq!(PowerDownMode::Urgent.code(), 0);
        assert_eq!(PowerDownMode::Normal.code(), 1);
    }

    #[tokio::test]
    async fn test_invalid_number_rejected_without_io() {
        let (io, _modem) = tokio::io::duplex(64);
        let (client, _handle) = ModemClient::spawn(io, EngineConfig::default());
        assert!(matches!(
            client.dial("555; ATH").await,
            Err(ModemError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_stream_fails_commands() {
        let (io, modem) = tokio::io::duplex(64);
        drop(modem);
        let (client, handle) = ModemClient::spawn(io, EngineConfig::default());
        handle.await.unwrap();
        assert!(client.is_closed());
        assert!(matches!(client.answer().await, Err(ModemError::SessionClosed)));
    }
}
