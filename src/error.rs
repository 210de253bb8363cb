use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with the bluetooth stack (bluer): {source}")]
    Bluetooth { #[from] source: bluer::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("The bluetooth adapter is powered off and could not be powered on")]
    AdapterDisabled,

    #[error("Not a valid bluetooth device address: {address}")]
    InvalidAddress { address: String },

    #[error("Failed to open RFCOMM channel: {source}")]
    Connect { source: io::Error },

    #[error("Failed sending command to device: {source}")]
    Send { source: io::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    Config { #[from] source: ConfigError },

    #[error("Device error: {source}")]
    Device { #[from] source: DeviceError },

    #[error("Failed reading terminal input: {source}")]
    Stdin { source: io::Error },
}
