//! gsmodem CLI - drive a GSM modem from the command line
//!
//! Opens the configured port, runs the init sequence and performs one
//! operation, or listens for unsolicited events until interrupted.

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use gsmodem_core::cli::print_exit_codes;
use gsmodem_core::config::{init_directories, ConfigError};
use gsmodem_core::core::transport::open_serial;
use gsmodem_core::{
    configure_line_speed, list_ports, CliResult, ExitCodes, ModemClient, ModemConfig,
    ModemError, ModemEvent, ShellRunner, Transcript,
};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// gsmodem CLI
#[derive(Parser, Debug)]
#[command(name = "gsmodem", version, about = "AT-command driver for GSM modems", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "GSMODEM_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port, overrides the config file
    #[arg(short, long, env = "GSMODEM_PORT")]
    port: Option<String>,

    /// Baud rate, overrides the config file
    #[arg(short, long)]
    baud: Option<u32>,

    /// Per-command timeout in seconds, overrides the config file
    #[arg(short, long)]
    timeout: Option<u64>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts,

    /// Show IMEI, SIM, signal, registration and operator
    Info,

    /// Stored messages
    Sms {
        #[command(subcommand)]
        action: SmsAction,
    },

    /// Start a voice call
    Dial {
        /// Number to call
        number: String,
    },

    /// Answer an incoming call
    Answer,

    /// Hang up the current call
    Hangup,

    /// SIM PIN management
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },

    /// Read the modem clock, or set it to local time
    Clock {
        /// Set the clock to the current local time
        #[arg(long)]
        sync: bool,
    },

    /// Restart the module
    Reboot,

    /// Send a raw AT command and print the response lines
    Raw {
        /// Command text, e.g. AT+CBC
        text: String,
    },

    /// Print events until interrupted; new messages are read and deleted
    Listen {
        /// Keep messages on the SIM after printing them
        #[arg(long)]
        keep: bool,
    },

    /// Print the exit code table
    ExitCodes,
}

#[derive(Subcommand, Debug)]
enum SmsAction {
    /// List all stored messages
    List,
    /// Read one message
    Read {
        /// Storage index
        id: u32,
    },
    /// Delete one message, or all of them
    Delete {
        /// Storage index
        #[arg(required_unless_present = "all")]
        id: Option<u32>,
        /// Delete every stored message
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PinAction {
    /// Show the SIM lock state
    Status,
    /// Unlock the SIM
    Enter {
        /// PIN code
        pin: String,
    },
    /// Change the SIM PIN
    Change {
        /// Current PIN
        old: String,
        /// New PIN
        new: String,
    },
}

#[derive(Serialize)]
struct ModemInfo {
    imei: String,
    pin: String,
    signal_bars: u8,
    registration: String,
    module_status: String,
    operator: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let result = match run(&cli).await {
        Ok(()) => CliResult::success(),
        Err(e) => classify_error(&e),
    };
    if let CliResult::Error(_, ref message) = result {
        eprintln!("Error: {message}");
    }
    result.to_exit_code()
}

fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn classify_error(err: &anyhow::Error) -> CliResult {
    if let Some(e) = err.downcast_ref::<ModemError>() {
        let mut result = CliResult::from(e);
        if let CliResult::Error(_, ref mut message) = result {
            *message = format!("{err:#}");
        }
        result
    } else if err.downcast_ref::<ConfigError>().is_some() {
        CliResult::error(ExitCodes::CONFIG_ERROR, format!("{err:#}"))
    } else {
        CliResult::error(ExitCodes::ERROR, format!("{err:#}"))
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::ListPorts => return show_ports(cli),
        Commands::ExitCodes => {
            print_exit_codes();
            return Ok(());
        }
        _ => {}
    }

    let (modem, mut engine) = connect(cli).await?;

    match &cli.command {
        Commands::Info => show_info(cli, &modem).await?,
        Commands::Sms { action } => handle_sms(cli, &modem, action).await?,
        Commands::Dial { number } => modem.dial(number).await?,
        Commands::Answer => modem.answer().await?,
        Commands::Hangup => modem.hang_up().await?,
        Commands::Pin { action } => handle_pin(cli, &modem, action).await?,
        Commands::Clock { sync } => {
            if *sync {
                modem.set_clock(&Local::now().naive_local()).await?;
            }
            let time = modem.clock().await?;
            output(cli, &time, || time.format("%Y-%m-%d %H:%M:%S").to_string())?;
        }
        Commands::Reboot => modem.reboot().await?,
        Commands::Raw { text } => {
            let lines = modem.command(text.as_str()).await?;
            output(cli, &lines, || lines.join("\n"))?;
        }
        Commands::Listen { keep } => listen(cli, &modem, &mut engine, *keep).await?,
        Commands::ListPorts | Commands::ExitCodes => {}
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<(ModemClient, JoinHandle<()>)> {
    let mut config = match cli.config {
        Some(ref path) => ModemConfig::load_from(path)?,
        None => ModemConfig::load()?,
    };
    if let Some(ref port) = cli.port {
        config.serial.port.clone_from(port);
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if cli.timeout.is_some() {
        config.command_timeout_secs = cli.timeout;
    }

    if config.set_line_speed {
        configure_line_speed(&ShellRunner, &config.serial.port, config.serial.baud_rate)
            .await
            .map_err(ModemError::from)?;
    }

    let transcript = match config.transcript.new_file_path() {
        Some(path) => {
            init_directories().context("Failed to create log directory")?;
            let mut transcript = Transcript::new();
            transcript
                .start(&path, config.transcript.format)
                .with_context(|| format!("Failed to open transcript {}", path.display()))?;
            tracing::info!("Recording traffic to {}", path.display());
            Some(transcript.shared())
        }
        None => None,
    };

    let stream = open_serial(&config.serial).map_err(ModemError::from)?;
    tracing::info!("Opened {}", config.serial.describe());

    let (modem, engine) =
        ModemClient::spawn_with_transcript(stream, config.engine_config(), transcript);
    let modem = modem.with_init_commands(config.init_commands);
    modem.init().await.context("Modem initialization failed")?;
    Ok((modem, engine))
}

fn output<T: Serialize>(cli: &Cli, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn show_ports(cli: &Cli) -> anyhow::Result<()> {
    let ports = list_ports().map_err(ModemError::from)?;
    let names: Vec<&str> = ports.iter().map(|p| p.port_name.as_str()).collect();
    if names.is_empty() && !cli.json {
        println!("No serial ports found.");
        return Ok(());
    }
    output(cli, &names, || names.join("\n"))
}

async fn show_info(cli: &Cli, modem: &ModemClient) -> anyhow::Result<()> {
    let info = ModemInfo {
        imei: modem.imei().await?,
        pin: format!("{:?}", modem.pin_status().await?),
        signal_bars: modem.signal_level().await?,
        registration: modem.registration().await?.to_string(),
        module_status: modem.module_status().await?.to_string(),
        operator: modem.operator().await?,
    };
    output(cli, &info, || {
        format!(
            "IMEI:         {}\nSIM:          {}\nSignal:       {}/5\nRegistration: {}\nStatus:       {}\nOperator:     {}",
            info.imei,
            info.pin,
            info.signal_bars,
            info.registration,
            info.module_status,
            info.operator
        )
    })
}

async fn handle_sms(cli: &Cli, modem: &ModemClient, action: &SmsAction) -> anyhow::Result<()> {
    match action {
        SmsAction::List => {
            let messages = modem.list_sms().await?;
            output(cli, &messages, || {
                messages
                    .iter()
                    .map(|sms| {
                        format!(
                            "#{} [{}] {} {}: {}",
                            sms.id(),
                            sms.status(),
                            sms.date_string(),
                            sms.from(),
                            sms.message()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        SmsAction::Read { id } => {
            let sms = modem.read_sms(*id).await?;
            output(cli, &sms, || {
                format!("From: {}\nDate: {}\n\n{}", sms.from(), sms.date_string(), sms.message())
            })
        }
        SmsAction::Delete { all: true, .. } => Ok(modem.delete_all_sms().await?),
        SmsAction::Delete { id: Some(id), .. } => Ok(modem.delete_sms(*id).await?),
        SmsAction::Delete { id: None, .. } => Err(ModemError::InvalidArgument(
            "message index or --all required".to_string(),
        )
        .into()),
    }
}

async fn handle_pin(cli: &Cli, modem: &ModemClient, action: &PinAction) -> anyhow::Result<()> {
    match action {
        PinAction::Status => {
            let status = modem.pin_status().await?;
            output(cli, &status, || format!("{status:?}"))
        }
        PinAction::Enter { pin } => Ok(modem.enter_pin(pin).await?),
        PinAction::Change { old, new } => Ok(modem.change_pin(old, new).await?),
    }
}

async fn listen(
    cli: &Cli,
    modem: &ModemClient,
    engine: &mut JoinHandle<()>,
    keep: bool,
) -> anyhow::Result<()> {
    let events = modem.subscribe();
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Interrupted");
    };
    listen_until(cli, modem, events, engine, keep, interrupted).await
}

/// Print events until `stop` resolves or the engine exits
async fn listen_until(
    cli: &Cli,
    modem: &ModemClient,
    mut events: broadcast::Receiver<ModemEvent>,
    engine: &mut JoinHandle<()>,
    keep: bool,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::pin!(stop);
    tracing::info!("Listening for modem events");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = &mut *engine => return Err(ModemError::SessionClosed.into()),
            () = &mut stop => return Ok(()),
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Missed {} events", n);
                continue;
            }
            Err(RecvError::Closed) => return Err(ModemError::SessionClosed.into()),
        };

        output(cli, &event, || format!("[{}] {}", Local::now().format("%H:%M:%S"), event))?;

        if let ModemEvent::NewSms { index } = event {
            match take_message(cli, modem, index, keep).await {
                Ok(()) => {}
                Err(e) if matches!(e.downcast_ref::<ModemError>(), Some(ModemError::SessionClosed)) => {
                    return Err(e)
                }
                Err(e) => tracing::warn!("Failed to handle message #{}: {:#}", index, e),
            }
        }
    }
}

/// Print a newly stored message, then delete it unless `keep`
async fn take_message(cli: &Cli, modem: &ModemClient, index: u32, keep: bool) -> anyhow::Result<()> {
    let sms = modem.read_sms(index).await?;
    output(cli, &sms, || format!("  {}: {}", sms.from(), sms.message()))?;
    if !keep {
        modem.delete_sms(index).await?;
    }
    Ok(())
}
