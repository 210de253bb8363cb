use async_trait::async_trait;
use bluer::Address;
use futures::channel::mpsc::Sender;
use futures::SinkExt;
use log::{info, warn};

use crate::device::commands::{Channel, Command};
use crate::device::transport::{CommandSink, SendOutcome, Transport, WriteErrorPolicy};
use crate::device::types::{ChannelLevels, DeviceEvent, DeviceState, LevelsHandle, PairedDevice};
use crate::error::DeviceError;

/// The platform bluetooth stack, reduced to the two things the manager needs
/// from it. The production implementation is `device::discovery::Bluetooth`
/// (BlueZ via bluer); tests substitute an in-memory stack.
#[async_trait]
pub trait BluetoothStack: Send + Sync {
    /// Enumerate the adapter's bonded devices, in adapter order.
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError>;

    /// Open an RFCOMM channel to the device's serial port service.
    async fn open_rfcomm(&self, address: Address) -> Result<CommandSink, DeviceError>;
}

/// Owns the single connection to the prop and the channel levels, and is the
/// only place either is mutated. Callers hold it exclusively (or drive it
/// through `device::task`, which processes one request at a time), so there
/// is never more than one outstanding connect attempt.
pub struct DeviceManager<S: BluetoothStack> {
    stack: S,
    transport: Transport,
    levels: LevelsHandle,
    event_senders: Vec<Sender<DeviceEvent>>,
}

impl<S: BluetoothStack> DeviceManager<S> {
    pub fn new(
        stack: S,
        initial_levels: ChannelLevels,
        write_error_policy: WriteErrorPolicy,
        event_senders: Vec<Sender<DeviceEvent>>,
    ) -> Self {
        DeviceManager {
            stack,
            transport: Transport::new(write_error_policy),
            levels: LevelsHandle::new(initial_levels),
            event_senders,
        }
    }

    /// A shared handle to the channel levels. Level changes made through it
    /// while a connect attempt is in flight are included in the resync.
    pub fn levels_handle(&self) -> LevelsHandle {
        self.levels.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn emit(&mut self, event: DeviceEvent) {
        for sender in &mut self.event_senders {
            if let Err(err) = sender.send(event.clone()).await {
                warn!("Failed to deliver device event: {:?}", err);
            }
        }
    }

    /// Connect to the given device. Any previously open connection is closed
    /// first. Emits `StateChange(Connecting)` and then exactly one completion
    /// event: `StateChange(Connected)` or `ConnectFailed`. On success the
    /// current channel levels are re-sent so the prop matches them again.
    ///
    /// A failed attempt leaves the manager empty and ready for the next
    /// attempt; there is no automatic retry.
    pub async fn connect_to(&mut self, address: Address) -> Result<(), DeviceError> {
        self.transport.close().await;

        info!("Connecting to {}...", address);
        self.emit(DeviceEvent::StateChange(DeviceState::Connecting)).await;

        match self.stack.open_rfcomm(address).await {
            Ok(sink) => {
                self.transport.attach(sink);
                info!("Connected to {}", address);
                self.emit(DeviceEvent::StateChange(DeviceState::Connected)).await;
                self.resync().await;
                Ok(())
            },
            Err(err) => {
                warn!("Failed connecting to {}: {}", address, err);
                self.emit(DeviceEvent::ConnectFailed {
                    address,
                    reason: err.to_string(),
                }).await;
                Err(err)
            },
        }
    }

    /// Connect to the first bonded device, if any. With zero bonded devices
    /// this does nothing at all: no events, no error.
    pub async fn auto_connect(&mut self) -> Result<bool, DeviceError> {
        let devices = self.stack.paired_devices().await?;

        match devices.first() {
            None => {
                info!("No paired devices, skipping auto-connect");
                Ok(false)
            },
            Some(device) => {
                info!("Auto-connecting to first paired device {}", device);
                self.connect_to(device.address).await?;
                Ok(true)
            },
        }
    }

    /// Enumerate bonded devices and publish the list to subscribers.
    pub async fn refresh_devices(&mut self) -> Result<Vec<PairedDevice>, DeviceError> {
        let devices = self.stack.paired_devices().await?;
        info!("Found {} paired devices", devices.len());
        self.emit(DeviceEvent::DeviceList(devices.clone())).await;
        Ok(devices)
    }

    /// Store the new level and push it to the prop if connected.
    pub async fn set_level(&mut self, channel: Channel, value: u8) -> Result<SendOutcome, DeviceError> {
        self.levels.set(channel, value);
        self.transport.send(&Command::Set(channel, value)).await
    }

    /// Turn every light off. The soulstone/eyes/mouth levels are zeroed to
    /// match, the way the original control panel zeroed its sliders.
    pub async fn all_off(&mut self) -> Result<SendOutcome, DeviceError> {
        self.levels.set(Channel::Soulstone, 0);
        self.levels.set(Channel::Eyes, 0);
        self.levels.set(Channel::Mouth, 0);
        self.transport.send(&Command::Off).await
    }

    pub async fn disconnect(&mut self) {
        if self.transport.close().await {
            info!("Disconnected from device");
            self.emit(DeviceEvent::StateChange(DeviceState::Disconnected)).await;
        }
    }

    // Re-send the current levels after a connect, so the prop reflects level
    // changes made while it was unreachable. Reads the levels at completion
    // time, not at the time the connect attempt started.
    async fn resync(&mut self) {
        for command in self.levels.get().resync_commands() {
            if let Err(err) = self.transport.send(&command).await {
                warn!("Resync write failed: {}", err);
            }
        }
    }
}
