use bluer::Address;
use clap::{Parser, Subcommand};
use futures::channel::mpsc::{channel, Sender};
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::commands::Channel;
use crate::device::discovery::Bluetooth;
use crate::device::manager::{BluetoothStack, DeviceManager};
use crate::device::task::{device_task, DeviceCommand};
use crate::device::transport::WriteErrorPolicy;
use crate::device::types::{ChannelLevels, DeviceEvent, DeviceState, PairedDevice};
use crate::error::{AppRunError, DeviceError};

#[derive(Debug, Parser)]
#[command(name = "d2head-control", version, about = "Control the Diablo II head prop over bluetooth")]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// List the paired bluetooth devices
    Devices,
    /// Connect to the prop and control it interactively (the default)
    Run {
        /// Connect to this device address instead of the configured one
        #[arg(long)]
        address: Option<String>,
        /// Do not connect automatically at startup
        #[arg(long)]
        no_auto_connect: bool,
    },
    /// Connect, turn every light off, and exit
    Off {
        /// Connect to this device address instead of the first paired device
        #[arg(long)]
        address: Option<String>,
    },
    /// Show or change the stored configuration
    Config {
        /// Store this device address for future connects
        #[arg(long)]
        address: Option<String>,
        /// Forget the stored device address
        #[arg(long)]
        clear_address: bool,
        /// Whether to connect automatically at startup
        #[arg(long)]
        auto_connect: Option<bool>,
    },
}

pub async fn run() -> Result<(), AppRunError> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(CliCommand::Run { address: None, no_auto_connect: false }) {
        CliCommand::Devices => run_devices().await,
        CliCommand::Run { address, no_auto_connect } => run_control(address, no_auto_connect).await,
        CliCommand::Off { address } => run_off(address).await,
        CliCommand::Config { address, clear_address, auto_connect } => {
            run_config(address, clear_address, auto_connect).await
        },
    }
}

fn parse_address(value: &str) -> Result<Address, DeviceError> {
    value.parse().map_err(|_| DeviceError::InvalidAddress { address: value.to_string() })
}

async fn load_config_or_default(config_io: &ConfigIO) -> Config {
    match config_io.read().await {
        Ok(config) => config,
        Err(err) => {
            if err.is_file_not_found_error() {
                info!("Config file not found, using defaults");
            } else {
                error!("Failed to load config: {:?}", err);
            }
            Config::default()
        },
    }
}

fn print_device_list(devices: &[PairedDevice]) {
    if devices.is_empty() {
        println!("No paired devices");
        return;
    }

    println!("{} paired device(s):", devices.len());
    for device in devices {
        let marker = if device.has_spp { " [serial port]" } else { "" };
        println!("  {}{}", device, marker);
    }
}

fn print_event(event: &DeviceEvent) {
    match event {
        DeviceEvent::StateChange(DeviceState::Connecting) => println!("Connecting..."),
        DeviceEvent::StateChange(DeviceState::Connected) => println!("Connected, channel levels resynced"),
        DeviceEvent::StateChange(DeviceState::Disconnected) => println!("Disconnected"),
        DeviceEvent::ConnectFailed { address, reason } => {
            println!("Failed connecting to {}: {}", address, reason);
        },
        DeviceEvent::DeviceList(devices) => print_device_list(devices),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  s|e|m|v|b <0-255>    set soulstone/eyes/mouth/variation/baseline-sync intensity");
    println!("  off                  turn every light off");
    println!("  devices              list paired bluetooth devices");
    println!("  connect [<address>]  connect to a device (first paired device when omitted)");
    println!("  quit                 exit");
}

/// One line of terminal input, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineCommand {
    Set(Channel, u8),
    Off,
    Devices,
    Connect(Option<Address>),
    Quit,
    Help,
}

fn parse_line(line: &str) -> Result<Option<LineCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };

    let command = match word {
        "off" => LineCommand::Off,
        "devices" => LineCommand::Devices,
        "quit" | "exit" => LineCommand::Quit,
        "help" | "?" => LineCommand::Help,
        "connect" => match parts.next() {
            None => LineCommand::Connect(None),
            Some(value) => {
                let address = value
                    .parse()
                    .map_err(|_| format!("Not a valid bluetooth device address: {}", value))?;
                LineCommand::Connect(Some(address))
            },
        },
        key => {
            let Some(channel) = Channel::from_key(key) else {
                return Err(format!("Unknown command: {} (try 'help')", word));
            };
            let Some(value) = parts.next() else {
                return Err(format!("Usage: {} <0-255>", key));
            };
            let value: u8 = value
                .parse()
                .map_err(|_| format!("Intensity must be a number in 0-255, got: {}", value))?;
            LineCommand::Set(channel, value)
        },
    };

    if parts.next().is_some() {
        return Err("Too many arguments (try 'help')".to_string());
    }

    Ok(Some(command))
}

async fn dispatch(commands: &mut Sender<DeviceCommand>, command: DeviceCommand) {
    if let Err(err) = commands.send(command).await {
        warn!("Device worker is gone: {:?}", err);
    }
}

async fn run_control(address: Option<String>, no_auto_connect: bool) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let config = load_config_or_default(&config_io).await;

    let bluetooth = Bluetooth::new().await?;

    let cancel = CancellationToken::new();
    let (event_sender, mut event_receiver) = channel::<DeviceEvent>(64);
    let (mut commands, task_handle) = device_task(
        cancel.clone(),
        bluetooth,
        config.levels,
        WriteErrorPolicy::KeepStream,
        vec![event_sender],
    );

    let target = address.or_else(|| config.device_address.clone());
    if let Some(value) = &target {
        let address = parse_address(value)?;
        dispatch(&mut commands, DeviceCommand::Connect(address)).await;
    } else if config.auto_connect && !no_auto_connect {
        dispatch(&mut commands, DeviceCommand::AutoConnect).await;
    }

    println!("Type 'help' for the list of commands.");
    let mut lines = BufReader::new(stdin()).lines();

    'mainloop: loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break 'mainloop;
            },
            result = lines.next_line() => {
                let Some(line) = result.map_err(|source| AppRunError::Stdin { source })? else {
                    // stdin closed
                    break 'mainloop;
                };

                match parse_line(&line) {
                    Ok(None) => {},
                    Err(message) => println!("{}", message),
                    Ok(Some(LineCommand::Quit)) => break 'mainloop,
                    Ok(Some(LineCommand::Help)) => print_help(),
                    Ok(Some(LineCommand::Off)) => {
                        println!("Everything off");
                        dispatch(&mut commands, DeviceCommand::AllOff).await;
                    },
                    Ok(Some(LineCommand::Set(channel, value))) => {
                        println!("{} at {}% power", channel, value as u32 * 100 / 255);
                        dispatch(&mut commands, DeviceCommand::SetLevel(channel, value)).await;
                    },
                    Ok(Some(LineCommand::Devices)) => {
                        dispatch(&mut commands, DeviceCommand::RefreshDevices).await;
                    },
                    Ok(Some(LineCommand::Connect(Some(address)))) => {
                        dispatch(&mut commands, DeviceCommand::Connect(address)).await;
                    },
                    Ok(Some(LineCommand::Connect(None))) => {
                        dispatch(&mut commands, DeviceCommand::AutoConnect).await;
                    },
                }
            },
            Some(event) = event_receiver.next() => {
                print_event(&event);
            },
        }
    }

    cancel.cancel();
    if let Err(err) = task_handle.await {
        warn!("Failed to join device task: {:?}", err);
    }
    Ok(())
}

async fn run_devices() -> Result<(), AppRunError> {
    let bluetooth = Bluetooth::new().await?;
    let devices = bluetooth.paired_devices().await?;
    print_device_list(&devices);
    Ok(())
}

async fn run_off(address: Option<String>) -> Result<(), AppRunError> {
    let bluetooth = Bluetooth::new().await?;

    // Everything is going off anyway, so resync with all-zero levels instead
    // of flashing the startup defaults first.
    let levels = ChannelLevels { soulstone: 0, eyes: 0, mouth: 0, variation: 0, baseline_sync: 0 };
    let mut manager = DeviceManager::new(bluetooth, levels, WriteErrorPolicy::KeepStream, vec![]);

    match address {
        Some(value) => {
            manager.connect_to(parse_address(&value)?).await?;
        },
        None => {
            if !manager.auto_connect().await? {
                println!("No paired devices");
                return Ok(());
            }
        },
    }

    manager.all_off().await?;
    manager.disconnect().await;
    println!("Everything off");
    Ok(())
}

async fn run_config(
    address: Option<String>,
    clear_address: bool,
    auto_connect: Option<bool>,
) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let mut config = load_config_or_default(&config_io).await;

    if clear_address {
        config.device_address = None;
    }
    if let Some(value) = address {
        // validate before storing
        parse_address(&value)?;
        config.device_address = Some(value);
    }
    if let Some(value) = auto_connect {
        config.auto_connect = value;
    }

    config_io.save(config.clone()).await?;

    println!("deviceAddress: {}", config.device_address.as_deref().unwrap_or("(none)"));
    println!("autoConnect:   {}", config.auto_connect);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_set_lines() {
        assert_eq!(parse_line("s 200"), Ok(Some(LineCommand::Set(Channel::Soulstone, 200))));
        assert_eq!(parse_line("  b 0 "), Ok(Some(LineCommand::Set(Channel::BaselineSync, 0))));
        assert!(parse_line("s").is_err());
        assert!(parse_line("s 300").is_err());
        assert!(parse_line("s 10 20").is_err());
    }

    #[test]
    fn parses_bare_words() {
        assert_eq!(parse_line("off"), Ok(Some(LineCommand::Off)));
        assert_eq!(parse_line("devices"), Ok(Some(LineCommand::Devices)));
        assert_eq!(parse_line("quit"), Ok(Some(LineCommand::Quit)));
        assert_eq!(parse_line("help"), Ok(Some(LineCommand::Help)));
        assert_eq!(parse_line(""), Ok(None));
        assert!(parse_line("bogus").is_err());
    }

    #[test]
    fn parses_connect_with_and_without_address() {
        assert_eq!(parse_line("connect"), Ok(Some(LineCommand::Connect(None))));

        let expected = "98:D3:31:80:12:34".parse().unwrap();
        assert_eq!(
            parse_line("connect 98:D3:31:80:12:34"),
            Ok(Some(LineCommand::Connect(Some(expected)))),
        );
        assert!(parse_line("connect not-an-address").is_err());
    }
}
