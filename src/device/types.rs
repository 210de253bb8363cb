use std::sync::{Arc, Mutex};
use bluer::Address;
use serde::{Deserialize, Serialize};

use crate::device::commands::{Channel, Command};
use crate::device::constants::FULL_INTENSITY;

/// A device from the adapter's bonded set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    pub address: Address,
    pub name: Option<String>,
    /// Whether the device advertises the serial port profile.
    pub has_spp: bool,
}

impl std::fmt::Display for PairedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => write!(f, "(unnamed) ({})", self.address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    StateChange(DeviceState),
    /// A connect attempt completed unsuccessfully. Emitted exactly once per
    /// failed attempt; successful attempts emit `StateChange(Connected)`
    /// instead.
    ConnectFailed { address: Address, reason: String },
    DeviceList(Vec<PairedDevice>),
}

/// The five channel intensities, as last requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelLevels {
    pub soulstone: u8,
    pub eyes: u8,
    pub mouth: u8,
    pub variation: u8,
    pub baseline_sync: u8,
}

impl Default for ChannelLevels {
    fn default() -> Self {
        ChannelLevels {
            soulstone: FULL_INTENSITY,
            eyes: FULL_INTENSITY,
            mouth: FULL_INTENSITY,
            variation: FULL_INTENSITY,
            baseline_sync: 0,
        }
    }
}

impl ChannelLevels {
    pub fn get(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Soulstone => self.soulstone,
            Channel::Eyes => self.eyes,
            Channel::Mouth => self.mouth,
            Channel::Variation => self.variation,
            Channel::BaselineSync => self.baseline_sync,
        }
    }

    pub fn set(&mut self, channel: Channel, value: u8) {
        match channel {
            Channel::Soulstone => self.soulstone = value,
            Channel::Eyes => self.eyes = value,
            Channel::Mouth => self.mouth = value,
            Channel::Variation => self.variation = value,
            Channel::BaselineSync => self.baseline_sync = value,
        }
    }

    /// The commands sent to resynchronize a freshly connected prop.
    ///
    /// Baseline-sync is not part of the resync set: the prop keeps its own
    /// baseline and only takes a `b=` push from an explicit user action.
    pub fn resync_commands(&self) -> [Command; 4] {
        [
            Command::Set(Channel::Soulstone, self.soulstone),
            Command::Set(Channel::Eyes, self.eyes),
            Command::Set(Channel::Mouth, self.mouth),
            Command::Set(Channel::Variation, self.variation),
        ]
    }
}

/// Shared handle to the channel levels. The manager resyncs from this on
/// connect completion, so level changes made while a connect attempt is in
/// flight are picked up.
#[derive(Debug, Clone)]
pub struct LevelsHandle {
    inner: Arc<Mutex<ChannelLevels>>,
}

impl LevelsHandle {
    pub fn new(levels: ChannelLevels) -> Self {
        LevelsHandle { inner: Arc::new(Mutex::new(levels)) }
    }

    pub fn get(&self) -> ChannelLevels {
        *self.inner.lock().expect("Failed to lock channel levels")
    }

    pub fn set(&self, channel: Channel, value: u8) {
        self.inner.lock().expect("Failed to lock channel levels").set(channel, value);
    }
}
