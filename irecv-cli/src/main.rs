use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use irecv_lib::transfer::stage_file;
use irecv_lib::usb::UsbTransport;
use irecv_lib::{
    CommandGate, CommandOutcome, Directive, DeviceSession, Dispatcher, Flow, IrecvError, OperationStatus, ProductMode,
    SessionConfig,
};

/// Talk to an Apple device in recovery, DFU or WTF mode over USB.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bootloader mode the device is expected in.
    #[arg(short, long, value_enum, default_value_t = Mode::Recovery, global = true)]
    mode: Mode,
    /// How long to wait for console output after each command, in milliseconds.
    #[arg(short, long, default_value_t = 500, global = true)]
    timeout: u64,
    /// Timeout for control transfers, in milliseconds.
    #[arg(long, default_value_t = 1000, global = true)]
    control_timeout: u64,
    /// Which modes accept text commands.
    #[arg(long, value_enum, default_value_t = Gate::DenyWtf, global = true)]
    gate: Gate,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive console: type commands, `/send <file>`, `/timeout <ms>`, `/reset` or `/exit`.
    Shell,
    /// Send one command and print whatever the device answers.
    Command {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Upload a file with the staged transfer protocol.
    Send { file: PathBuf },
    /// Print the device's name, serial and identity fields.
    Info,
    /// Reset the device.
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Recovery,
    Dfu,
    Wtf,
}

impl From<Mode> for ProductMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Recovery => ProductMode::Recovery,
            Mode::Dfu => ProductMode::Dfu,
            Mode::Wtf => ProductMode::Wtf,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Gate {
    Any,
    DenyWtf,
    RecoveryOnly,
}

impl From<Gate> for CommandGate {
    fn from(gate: Gate) -> Self {
        match gate {
            Gate::Any => CommandGate::Any,
            Gate::DenyWtf => CommandGate::DenyWtf,
            Gate::RecoveryOnly => CommandGate::RecoveryOnly,
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // Console output goes to stderr so stdout only carries device text
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv; RUST_LOG wins when set
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let status = run(&cli);
    info!("Result: {}", status);

    // Flush the file writer before exiting
    drop(guard);
    process::exit(status.exit_code());
}

fn run(cli: &Cli) -> OperationStatus {
    let config = SessionConfig::default()
        .with_control_timeout(Duration::from_millis(cli.control_timeout))
        .with_drain_timeout(Duration::from_millis(cli.timeout))
        .with_command_gate(cli.gate.into());

    let session = match DeviceSession::open_usb(cli.mode.into(), config) {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            return OperationStatus::from(&e);
        }
    };

    let result = match &cli.command {
        Command::Shell => run_shell(Dispatcher::new(session)).map(|()| CommandOutcome::Sent),
        Command::Command { text } => run_command(session, &text.join(" ")),
        Command::Send { file } => run_send(session, file).map(|()| CommandOutcome::Sent),
        Command::Info => {
            print_info(&session);
            Ok(CommandOutcome::Sent)
        }
        Command::Reset => session.reset().map(|()| CommandOutcome::Sent),
    };

    if let Err(ref e) = result {
        error!("{}", e);
    }
    OperationStatus::of(&result)
}

fn run_command(mut session: DeviceSession<UsbTransport>, text: &str) -> Result<CommandOutcome, IrecvError> {
    let outcome = session.send_command(text)?;
    if outcome == CommandOutcome::Sent {
        let timeout = session.config().drain_timeout;
        print_response(&session.drain_response(timeout)?.text());
    } else {
        info!("Device is rebooting.");
    }
    Ok(outcome)
}

fn run_send(mut session: DeviceSession<UsbTransport>, file: &Path) -> Result<(), IrecvError> {
    let payload = stage_file(file)?;
    session.send_payload_with_progress(payload, |p| {
        info!(
            "[{}/{}] {}/{} bytes",
            p.packets_sent, p.packet_count, p.bytes_sent, p.total_bytes
        );
    })?;
    Ok(())
}

fn run_shell(mut dispatcher: Dispatcher<UsbTransport>) -> Result<(), IrecvError> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let response = dispatcher.drain()?;
        if !response.is_empty() {
            print_response(&response.text());
        }

        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            // End of input behaves like /exit
            dispatcher.execute(Directive::Exit)?;
            return Ok(());
        };

        let directive = match Directive::parse(&line) {
            Ok(Some(directive)) => directive,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        match dispatcher.execute(directive) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Finished) => return Ok(()),
            Err(IrecvError::SessionClosed) => return Err(IrecvError::SessionClosed),
            Err(e) => error!("{} ({})", e, OperationStatus::from(&e)),
        }
    }
}

fn print_info(session: &DeviceSession<UsbTransport>) {
    println!("Mode:    {}", session.mode());
    println!("Name:    {}", session.name().unwrap_or("<unknown>"));
    println!("Serial:  {}", session.serial().unwrap_or("<unknown>"));
    match session.pipe() {
        Some(pipe) => println!("Pipe:    interface {} endpoint {:#04x}", pipe.interface, pipe.endpoint),
        None => println!("Pipe:    <none>"),
    }

    let Some(identity) = session.identity() else {
        return;
    };
    println!();
    if let Some(cpid) = identity.cpid {
        println!("CPID:    {:#06x}", cpid);
    }
    if let Some(bdid) = identity.bdid {
        println!("BDID:    {:#04x}", bdid);
    }
    if let Some(ecid) = identity.ecid {
        println!("ECID:    {:#018x}", ecid);
    }
    if let Some(ref tag) = identity.iboot_tag {
        println!("iBoot:   {}", tag);
    }
    for (key, value) in &identity.fields {
        println!("  {}={}", key, value);
    }
}

fn print_response(text: &str) {
    if !text.is_empty() {
        println!("{}", text.trim_end());
    }
}
