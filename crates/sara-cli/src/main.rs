//! `sara` - drive a SARA cellular module over a serial-to-TCP bridge.
//!
//! ```text
//! sara --addr 192.168.1.40:7000 probe
//! sara sim
//! sara scan --rat umts --timeout-secs 60
//! sara get --apn internet --domain api.example.com --path /v1/config --out config.json
//! sara post --apn internet --domain api.example.com --path /v1/telemetry --body telemetry.json
//! ```

mod port;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sara_at::{AtClient, RadioTechnology};
use sara_cellular::{
    Apn, CellularError, ConfigError, DataSession, Modem, ModemConfig, NoPowerControl, NoWatchdog,
    StagedBody, StagedFile, SystemClock,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::port::TcpSerialPort;

type CliModem = Modem<AtClient<TcpSerialPort, SystemClock>, NoPowerControl, SystemClock, NoWatchdog>;

/// Largest response body printed to stdout when no output file is given.
const MAX_INLINE_BODY: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(name = "sara", version, about = "Drive a u-blox SARA cellular module")]
struct Cli {
    /// Address of the serial-to-TCP bridge.
    #[arg(long, default_value = "127.0.0.1:7000")]
    addr: String,

    /// YAML file overriding timeouts and file names.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Power the module on and check that it answers.
    Probe,
    /// Read the subscriber identity.
    Sim,
    /// Check that at least one cell can be heard.
    Scan {
        #[arg(long, value_enum)]
        rat: Option<Rat>,
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
    /// HTTPS GET through the module.
    Get {
        #[command(flatten)]
        request: RequestArgs,
        /// Write the body here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upload a file and HTTPS POST it through the module.
    Post {
        #[command(flatten)]
        request: RequestArgs,
        /// Request body.
        #[arg(long)]
        body: PathBuf,
        /// Write the response body here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RequestArgs {
    #[arg(long)]
    apn: String,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    domain: String,
    #[arg(long, default_value = "443")]
    port: u16,
    #[arg(long, default_value = "/")]
    path: String,
    /// Timeout for registration, activation and the request itself.
    #[arg(long, default_value = "180")]
    timeout_secs: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Rat {
    Gsm,
    Umts,
    Auto,
}

impl From<Rat> for RadioTechnology {
    fn from(rat: Rat) -> Self {
        match rat {
            Rat::Gsm => RadioTechnology::Gsm,
            Rat::Umts => RadioTechnology::Umts,
            Rat::Auto => RadioTechnology::Automatic,
        }
    }
}

#[derive(Debug, Error)]
enum RunError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("modem: {0}")]
    Cellular(#[from] CellularError),

    #[error("I/O: {0}")]
    Io(#[from] io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("module not detected at {0}")]
    NotPresent(String),

    #[error("response body of {0} bytes is too large to print, use --out")]
    BodyTooLarge(usize),
}

#[derive(Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum Report {
    Present { addr: String },
    Sim { imsi: String },
    Cell { mcc: u32 },
    Http { status: u16, size: usize, out: Option<PathBuf> },
}

impl Report {
    fn print(&self, json: bool) -> Result<(), RunError> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }
        match self {
            Report::Present { addr } => println!("module present at {}", addr),
            Report::Sim { imsi } => println!("IMSI {}", imsi),
            Report::Cell { mcc } => println!("cell found, MCC {}", mcc),
            Report::Http { status, size, out } => match out {
                Some(path) => println!("HTTP {}: {} bytes written to {}", status, size, path.display()),
                None => eprintln!("HTTP {}: {} bytes", status, size),
            },
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let config = match &cli.config {
        Some(path) => ModemConfig::load(path)?,
        None => ModemConfig::default(),
    };

    let port = TcpSerialPort::connect(&cli.addr)?.with_write_timeout(config.command_timeout());
    let clock = SystemClock::new();
    let channel = AtClient::new(port, clock);
    let mut modem = Modem::new(channel, NoPowerControl, clock, NoWatchdog, config);

    modem.init()?;
    if !modem.is_present() {
        return Err(RunError::NotPresent(cli.addr));
    }

    let report = match cli.command {
        CliCommand::Probe => Report::Present { addr: cli.addr },
        CliCommand::Sim => Report::Sim {
            imsi: modem.check_sim()?.to_string(),
        },
        CliCommand::Scan { rat, timeout_secs } => {
            let timeout = Duration::from_secs(timeout_secs);
            if let Some(rat) = rat {
                modem.set_radio_technology(timeout, rat.into())?;
            }
            let cell = modem.scan(timeout)?;
            Report::Cell { mcc: cell.mcc }
        }
        CliCommand::Get { request, out } => {
            let session = connect(&mut modem, &request)?;
            let file = modem.https_get(
                &session,
                Duration::from_secs(request.timeout_secs),
                &request.domain,
                request.port,
                &request.path,
            )?;
            read_body(&mut modem, file, out)?
        }
        CliCommand::Post { request, body, out } => {
            let source = File::open(&body)?;
            let len = usize::try_from(source.metadata()?.len())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

            let session = connect(&mut modem, &request)?;
            modem.write_storage_to_staged_file(&mut BufReader::new(source), len)?;
            info!("Uploaded {} bytes from {}", len, body.display());

            let file = modem.https_post(
                &session,
                Duration::from_secs(request.timeout_secs),
                &request.domain,
                request.port,
                &request.path,
            )?;
            read_body(&mut modem, file, out)?
        }
    };

    report.print(cli.json)
}

/// Bring the module from synchronized to an active data session.
fn connect(modem: &mut CliModem, request: &RequestArgs) -> Result<DataSession, RunError> {
    let timeout = Duration::from_secs(request.timeout_secs);

    let imsi = modem.check_sim()?;
    info!("SIM {}", imsi);
    modem.create_secure_profile()?;

    let attachment = modem.attach(timeout)?;
    let apn = match (&request.username, &request.password) {
        (Some(username), password) => Apn::with_credentials(
            request.apn.as_str(),
            username.as_str(),
            password.as_deref().unwrap_or_default(),
        ),
        (None, _) => Apn::new(request.apn.as_str()),
    };
    Ok(modem.activate_packet_context(&attachment, &apn, timeout)?)
}

/// Read a staged response to `out`, or to stdout if it fits in memory.
fn read_body(modem: &mut CliModem, file: StagedFile, out: Option<PathBuf>) -> Result<Report, RunError> {
    let StagedBody { http_status, size } = match &out {
        Some(path) => {
            let mut sink = File::create(path)?;
            modem.read_staged_file_to_storage(file, &mut sink)?
        }
        None => {
            let mut buffer = vec![0u8; MAX_INLINE_BODY];
            let body = match modem.read_staged_file_to_buffer(file, &mut buffer) {
                Err(CellularError::BufferOverflow { required, .. }) => {
                    return Err(RunError::BodyTooLarge(required))
                }
                other => other?,
            };
            let mut stdout = io::stdout().lock();
            stdout.write_all(&buffer[..body.size])?;
            stdout.flush()?;
            body
        }
    };

    Ok(Report::Http {
        status: http_status,
        size,
        out,
    })
}
