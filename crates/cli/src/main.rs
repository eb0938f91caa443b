// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use regscope_config::SessionConfig;
use regscope_core::{validator, Base, Validation};
use regscope_ir::{Device, Peripheral, Register};
use regscope_openocd::{
    Inspector, MonitorEvent, OpenOcdClient, Poller, RegisterReadout, StatusMonitor, StatusSummary,
    TickOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

mod render;

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect peripheral registers of a target behind OpenOCD",
    long_about = None
)]
struct Cli {
    /// Log protocol traffic
    #[arg(short, long, global = true)]
    trace: bool,

    /// Session file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device description (SVD, YAML or JSON)
    #[arg(short, long, global = true)]
    description: Option<PathBuf>,

    /// OpenOCD telnet host
    #[arg(long, global = true)]
    host: Option<String>,

    /// OpenOCD telnet port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Reply timeout per command, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Status poll interval, in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Display and input base: bin, dec or hex
    #[arg(long, global = true)]
    base: Option<Base>,

    /// Re-read the watched peripheral whenever the target halts
    #[arg(long, global = true)]
    auto_read: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List peripherals by group.
    Peripherals,

    /// Show the register layout of a peripheral.
    Show {
        peripheral: String,
        register: Option<String>,
    },

    /// Read one register, or every readable register of a peripheral.
    Read {
        peripheral: String,
        register: Option<String>,

        /// Print readouts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a whole register.
    Write {
        peripheral: String,
        register: String,
        value: String,
    },

    /// Read-modify-write one field. The value may be an enumerated name.
    Set {
        peripheral: String,
        register: String,
        field: String,
        value: String,
    },

    /// Poll target status until the adapter goes away.
    Watch {
        /// Peripheral to re-read on halt
        #[arg(long)]
        peripheral: Option<String>,

        /// Stop after this many polls
        #[arg(long)]
        ticks: Option<u64>,
    },
}

/// A failed command and the exit code it maps to.
#[derive(Debug)]
struct Failure {
    code: u8,
    error: anyhow::Error,
}

impl Failure {
    fn config(error: anyhow::Error) -> Self {
        Self {
            code: EXIT_CONFIG_ERROR,
            error,
        }
    }

    fn runtime(error: anyhow::Error) -> Self {
        Self {
            code: EXIT_RUNTIME_ERROR,
            error,
        }
    }
}

type CommandResult = Result<(), Failure>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(failure) => {
            error!("{:#}", failure.error);
            ExitCode::from(failure.code)
        }
    }
}

fn run(cli: Cli) -> CommandResult {
    let config = session_config(&cli).map_err(Failure::config)?;
    let device = load_device(&config)?;

    match cli.command {
        Commands::Peripherals => {
            print!("{}", render::peripherals_text(&device));
            Ok(())
        }
        Commands::Show {
            peripheral,
            register,
        } => {
            let p = find_peripheral(&device, &peripheral)?;
            let r = register
                .as_deref()
                .map(|name| find_register(p, name))
                .transpose()?;
            print!("{}", render::layout_text(p, r));
            Ok(())
        }
        Commands::Read {
            peripheral,
            register,
            json,
        } => run_read(&config, &device, &peripheral, register.as_deref(), json),
        Commands::Write {
            peripheral,
            register,
            value,
        } => run_write(&config, &device, &peripheral, &register, &value),
        Commands::Set {
            peripheral,
            register,
            field,
            value,
        } => run_set(&config, &device, &peripheral, &register, &field, &value),
        Commands::Watch { peripheral, ticks } => run_watch(&config, device, peripheral, ticks),
    }
}

fn session_config(cli: &Cli) -> anyhow::Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    if let Some(description) = &cli.description {
        config.description = Some(description.clone());
    }
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    if let Some(base) = cli.base {
        config.display_base = base;
    }
    if cli.auto_read {
        config.auto_read = true;
    }

    config.validate()?;
    Ok(config)
}

fn load_device(config: &SessionConfig) -> Result<Device, Failure> {
    let Some(path) = &config.description else {
        return Err(Failure::config(anyhow!(
            "No device description given (use --description or 'description' in the session file)"
        )));
    };
    match regscope_ir::load_description(path) {
        Ok(device) => {
            info!(
                "Loaded {} peripherals from {:?}",
                device.peripherals.len(),
                path
            );
            Ok(device)
        }
        Err(e) => {
            tracing::debug!("Loading {:?} failed: {}", path, e);
            Err(Failure::config(anyhow!("{}: file is corrupted", path.display())))
        }
    }
}

fn find_peripheral<'a>(device: &'a Device, name: &str) -> Result<&'a Peripheral, Failure> {
    device
        .peripheral(name)
        .ok_or_else(|| Failure::config(anyhow!("Unknown peripheral '{}'", name)))
}

fn find_register<'a>(peripheral: &'a Peripheral, name: &str) -> Result<&'a Register, Failure> {
    peripheral.register(name).ok_or_else(|| {
        Failure::config(anyhow!(
            "Peripheral {} has no register '{}'",
            peripheral.name,
            name
        ))
    })
}

fn connect(config: &SessionConfig) -> Result<(Arc<OpenOcdClient>, String), Failure> {
    let client = Arc::new(OpenOcdClient::new());
    let target = client
        .open(&config.host, config.port, config.timeout())
        .with_context(|| format!("Failed to connect to OpenOCD at {}", config.address()))
        .map_err(Failure::runtime)?;
    Ok((client, target))
}

/// Parses user input for a `width`-bit value in `base`.
///
/// Input that is merely incomplete (fewer digits than the width) is
/// accepted; anything no further typing could make valid is rejected.
fn parse_value(text: &str, base: Base, width: u32) -> anyhow::Result<u32> {
    let text = text.trim();
    let candidate = match base {
        Base::Hex => {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            format!("0x{}", digits)
        }
        _ => text.to_string(),
    };
    if validator(base, width).check(&candidate) == Validation::Invalid {
        anyhow::bail!("'{}' is not a valid {}-bit {} value", text, width, base);
    }
    let value = regscope_core::parse(&candidate, base)
        .with_context(|| format!("Failed to parse '{}'", text))?;
    if value > regscope_core::codec::max_value(width) {
        anyhow::bail!("'{}' does not fit in {} bits", text, width);
    }
    Ok(value)
}

fn run_read(
    config: &SessionConfig,
    device: &Device,
    peripheral: &str,
    register: Option<&str>,
    json: bool,
) -> CommandResult {
    let p = find_peripheral(device, peripheral)?;
    let selected = match register {
        Some(name) => {
            let r = find_register(p, name)?;
            if !r.is_readable() {
                return Err(Failure::config(anyhow!(
                    "{}.{} is write-only",
                    p.name,
                    r.name
                )));
            }
            Some(r)
        }
        None => None,
    };

    let (client, _) = connect(config)?;
    let inspector = Inspector::new(client.clone());
    let readouts = match selected {
        Some(r) => vec![RegisterReadout {
            register: r.name.clone(),
            address: p.effective_address(r),
            value: inspector.read_register(p, r),
        }],
        None => inspector.read_peripheral(p),
    };
    client.close();

    let reports: Vec<_> = readouts
        .iter()
        .filter_map(|readout| {
            let r = p.register(&readout.register)?;
            Some(render::register_report(p, r, readout, config.display_base))
        })
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&reports)
            .context("Failed to serialize readouts")
            .map_err(Failure::runtime)?;
        println!("{}", text);
    } else {
        for report in &reports {
            print!("{}", render::register_text(report));
        }
    }

    let failed = readouts.iter().filter(|r| r.value.is_err()).count();
    if failed > 0 {
        return Err(Failure::runtime(anyhow!(
            "{} of {} register reads failed",
            failed,
            readouts.len()
        )));
    }
    Ok(())
}

fn run_write(
    config: &SessionConfig,
    device: &Device,
    peripheral: &str,
    register: &str,
    value: &str,
) -> CommandResult {
    let p = find_peripheral(device, peripheral)?;
    let r = find_register(p, register)?;
    if !r.access.is_writable() {
        return Err(Failure::config(anyhow!("{}.{} is read-only", p.name, r.name)));
    }
    let value = parse_value(value, config.display_base, r.size).map_err(Failure::config)?;

    let (client, _) = connect(config)?;
    let result = Inspector::new(client.clone()).write_register(p, r, value);
    client.close();
    result
        .with_context(|| format!("Failed to write {}.{}", p.name, r.name))
        .map_err(Failure::runtime)?;

    println!(
        "{}.{} <- {}",
        p.name,
        r.name,
        regscope_core::format(value, config.display_base, r.size)
    );
    Ok(())
}

fn run_set(
    config: &SessionConfig,
    device: &Device,
    peripheral: &str,
    register: &str,
    field: &str,
    value: &str,
) -> CommandResult {
    let p = find_peripheral(device, peripheral)?;
    let r = find_register(p, register)?;
    let f = r.field(field).ok_or_else(|| {
        Failure::config(anyhow!("{}.{} has no field '{}'", p.name, r.name, field))
    })?;
    if !f.access.is_writable() || !r.access.is_writable() {
        return Err(Failure::config(anyhow!(
            "{}.{}.{} is read-only",
            p.name,
            r.name,
            f.name
        )));
    }
    let field_value = match f.enum_by_name(value) {
        Some(ev) => ev.value,
        None => parse_value(value, config.display_base, f.width()).map_err(Failure::config)?,
    };

    let (client, _) = connect(config)?;
    let inspector = Inspector::new(client.clone());
    let result = (|| -> anyhow::Result<u32> {
        let previous = if r.is_readable() {
            inspector.read_register(p, r)?
        } else {
            tracing::debug!("{}.{} is write-only, other fields written as zero", p.name, r.name);
            0
        };
        Ok(inspector.write_field(p, r, &f.name, field_value, previous)?)
    })();
    client.close();
    let written = result
        .with_context(|| format!("Failed to set {}.{}.{}", p.name, r.name, f.name))
        .map_err(Failure::runtime)?;

    println!(
        "{}.{} <- {}",
        p.name,
        r.name,
        regscope_core::format(written, config.display_base, r.size)
    );
    Ok(())
}

fn run_watch(
    config: &SessionConfig,
    device: Device,
    peripheral: Option<String>,
    ticks: Option<u64>,
) -> CommandResult {
    if let Some(name) = &peripheral {
        find_peripheral(&device, name)?;
    }

    let (client, target) = connect(config)?;
    let device = Arc::new(device);
    let base = config.display_base;
    let printer = device.clone();
    let mut monitor = StatusMonitor::new(client.clone(), device, target)
        .with_auto_read(config.auto_read)
        .with_sink(move |event| print_event(&printer, event, base));
    monitor.select_peripheral(peripheral);

    let lost = Arc::new(AtomicBool::new(false));
    let flag = lost.clone();
    let mut poller = Poller::start(config.poll_interval(), move |tick| {
        let outcome = monitor.tick();
        if *monitor.status() == StatusSummary::Disconnected {
            flag.store(true, Ordering::SeqCst);
        }
        match ticks {
            Some(limit) if tick.index + 1 >= limit => TickOutcome::Stop,
            _ => outcome,
        }
    });
    poller.wait();

    client.close();
    info!("Stopped after {} polls", poller.fired());
    if lost.load(Ordering::SeqCst) {
        return Err(Failure::runtime(anyhow!(
            "Connection to OpenOCD at {} lost",
            config.address()
        )));
    }
    Ok(())
}

fn print_event(device: &Device, event: MonitorEvent, base: Base) {
    match event {
        MonitorEvent::Status(status) => println!("{}", status),
        MonitorEvent::Readout {
            peripheral,
            registers,
        } => {
            let Some(p) = device.peripheral(&peripheral) else {
                return;
            };
            for readout in &registers {
                if let Some(r) = p.register(&readout.register) {
                    print!("{}", render::register_text(&render::register_report(p, r, readout, base)));
                }
            }
        }
    }
}
