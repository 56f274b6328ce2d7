use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use hilkit_core::config::RunConfig;
use hilkit_core::logging::{LogSinks, init_tracing};
use hilkit_core::protocol::constants::{YEPKIT_VENDOR_ID, YKUR_PIDS, YKUSH_PIDS};
use hilkit_core::transport::{DeviceBackend, HidTransport, NusbBackend};
use hilkit_core::xray::{self, JunitTestSuite, XrayResults};
use hilkit_core::yepkit::{PortState, RelayTarget, YkurBoard, YkushHub};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Yepkit relay control and Xray result reshaping", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run configuration (TOML), supplies default device serials
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached Yepkit devices
    List,

    /// Control a YKUSH power hub
    Ykush {
        /// Serial number of the hub
        #[arg(long)]
        serial: Option<String>,

        #[command(subcommand)]
        action: HubAction,
    },

    /// Control a YKUR relay board
    Ykur {
        /// Serial number of the board
        #[arg(long)]
        serial: Option<String>,

        #[command(subcommand)]
        action: BoardAction,
    },

    /// Turn JUnit suites (JSON) into an Xray import
    Xray {
        /// JSON file holding a list of test suites
        input: PathBuf,

        /// Existing test execution to update
        #[arg(long)]
        execution_key: Option<String>,

        /// Summary of a new test execution
        #[arg(long)]
        summary: Option<String>,

        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum HubAction {
    /// Power a port on: a port number or "all"
    On { port: String },
    /// Power a port off: a port number or "all"
    Off { port: String },
    /// Print the state of every port
    State,
    /// Print the firmware version
    Firmware,
}

#[derive(Subcommand, Debug)]
enum BoardAction {
    /// Switch a relay on
    On {
        #[arg(value_enum, default_value_t = Group::Port)]
        group: Group,
        /// Relay number, 0 being the on-board relay
        port: Option<u8>,
    },
    /// Switch a relay off
    Off {
        #[arg(value_enum, default_value_t = Group::Port)]
        group: Group,
        /// Relay number, 0 being the on-board relay
        port: Option<u8>,
    },
    /// Print the state of every relay
    State,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Group {
    Port,
    External,
    All,
}

fn relay_target(group: Group, port: Option<u8>) -> Result<RelayTarget> {
    match (group, port) {
        (Group::Port, Some(port)) => Ok(RelayTarget::Port(port)),
        (Group::Port, None) => bail!("a relay number is required"),
        (Group::External, _) => Ok(RelayTarget::ExternalRelays),
        (Group::All, _) => Ok(RelayTarget::All),
    }
}

fn list_devices() -> Result<()> {
    let devices = NusbBackend.enumerate()?;
    let yepkit = devices
        .iter()
        .filter(|d| d.vendor_id == YEPKIT_VENDOR_ID)
        .filter(|d| YKUR_PIDS.contains(&d.product_id) || YKUSH_PIDS.contains(&d.product_id));

    let mut found = 0;
    for device in yepkit {
        let kind = if YKUR_PIDS.contains(&device.product_id) { "YKUR" } else { "YKUSH" };
        println!(
            "{kind:<6} {:04X}:{:04X} serial={} path={}",
            device.vendor_id,
            device.product_id,
            device.serial_number.as_deref().unwrap_or("-"),
            device.path
        );
        found += 1;
    }
    info!(count = found, "Yepkit devices listed");
    Ok(())
}

/// A hub port number, or every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HubPort {
    Port(u8),
    All,
}

fn parse_hub_port(value: &str) -> Result<HubPort> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(HubPort::All);
    }
    let port = value
        .parse()
        .with_context(|| format!("invalid port {value:?}, expected a number or \"all\""))?;
    Ok(HubPort::Port(port))
}

fn switch_hub<T: HidTransport>(hub: &YkushHub<T>, port: &str, state: PortState) -> Result<()> {
    match parse_hub_port(port)? {
        HubPort::All => hub.set_all_ports(state)?,
        HubPort::Port(port) => hub.set_port_state(port, state)?,
    }
    println!("{port}: {state}");
    Ok(())
}

fn run_hub(serial: Option<&str>, action: HubAction) -> Result<()> {
    let hub = YkushHub::open(&NusbBackend, serial)?;
    match action {
        HubAction::On { port } => switch_hub(&hub, &port, PortState::On),
        HubAction::Off { port } => switch_hub(&hub, &port, PortState::Off),
        HubAction::State => {
            for (index, state) in hub.get_all_ports_state()?.into_iter().enumerate() {
                println!("port {}: {state}", index + 1);
            }
            Ok(())
        }
        HubAction::Firmware => {
            println!("{}", hub.get_firmware_version()?);
            Ok(())
        }
    }
}

fn run_board(serial: Option<&str>, action: BoardAction) -> Result<()> {
    let board = YkurBoard::open(&NusbBackend, serial)?;
    match action {
        BoardAction::On { group, port } => {
            let target = relay_target(group, port)?;
            board.set_state(target, PortState::On)?;
            println!("{target}: ON");
        }
        BoardAction::Off { group, port } => {
            let target = relay_target(group, port)?;
            board.set_state(target, PortState::Off)?;
            println!("{target}: OFF");
        }
        BoardAction::State => {
            for (index, state) in board.get_all_ports_state()?.into_iter().enumerate() {
                println!("relay {index}: {state}");
            }
        }
    }
    Ok(())
}

fn run_xray(
    input: &Path,
    execution_key: Option<&str>,
    summary: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let suites: Vec<JunitTestSuite> = serde_json::from_str(&content)?;
    let results = xray::create_result_dictionary(&suites, summary)?;
    let reformatted: Vec<XrayResults> =
        xray::merge_results(xray::reformat_xml_results(results, execution_key));
    let json = serde_json::to_string_pretty(&reformatted)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(path = %path.display(), "Xray results written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let sinks = LogSinks::new();
    if let Err(e) = init_tracing(args.verbose, &sinks) {
        eprintln!("Failed to initialise logging: {e}");
    }

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => RunConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };

    match args.command {
        Command::List => list_devices(),
        Command::Ykush { serial, action } => {
            let serial = serial.or(config.devices.ykush_serial);
            run_hub(serial.as_deref(), action)
        }
        Command::Ykur { serial, action } => {
            let serial = serial.or(config.devices.ykur_serial);
            run_board(serial.as_deref(), action)
        }
        Command::Xray {
            input,
            execution_key,
            summary,
            output,
        } => run_xray(&input, execution_key.as_deref(), summary.as_deref(), output),
    }
}
