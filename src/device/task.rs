use bluer::Address;
use futures::channel::mpsc::{channel, Sender};
use futures::{SinkExt, StreamExt};
use log::warn;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::commands::Channel;
use crate::device::manager::{BluetoothStack, DeviceManager};
use crate::device::transport::WriteErrorPolicy;
use crate::device::types::{ChannelLevels, DeviceEvent};

/// Requests accepted by the device worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Connect(Address),
    AutoConnect,
    SetLevel(Channel, u8),
    AllOff,
    Disconnect,
    RefreshDevices,
}

/// Spawn the worker that owns the [`DeviceManager`]. Requests are processed
/// one at a time in arrival order, which is what serializes all mutation of
/// the connection: a connect request arriving while another is in flight
/// simply queues behind it. Connect/send failures are reported through the
/// event senders, so the returned command channel is fire-and-forget.
///
/// The worker stops when `cancel` fires, closing any open connection. An
/// individual in-flight connect attempt is not cancellable.
pub fn device_task<S: BluetoothStack + 'static>(
    cancel: CancellationToken,
    stack: S,
    initial_levels: ChannelLevels,
    write_error_policy: WriteErrorPolicy,
    event_senders: Vec<Sender<DeviceEvent>>,
) -> (Sender<DeviceCommand>, JoinHandle<()>) {
    let (command_sender, mut command_receiver) = channel::<DeviceCommand>(32);

    let handle = spawn(async move {
        let mut manager = DeviceManager::new(stack, initial_levels, write_error_policy, event_senders);

        'mainloop: loop {
            // biased: drain queued requests before acting on a cancellation
            tokio::select! {
                biased;
                Some(command) = command_receiver.next() => {
                    match command {
                        DeviceCommand::Connect(address) => {
                            // Failure is already evented; nothing to retry here.
                            let _ = manager.connect_to(address).await;
                        },
                        DeviceCommand::AutoConnect => {
                            if let Err(err) = manager.auto_connect().await {
                                warn!("Auto-connect failed: {}", err);
                            }
                        },
                        DeviceCommand::SetLevel(channel, value) => {
                            if let Err(err) = manager.set_level(channel, value).await {
                                warn!("Failed sending command to device: {}", err);
                            }
                        },
                        DeviceCommand::AllOff => {
                            if let Err(err) = manager.all_off().await {
                                warn!("Failed sending command to device: {}", err);
                            }
                        },
                        DeviceCommand::Disconnect => {
                            manager.disconnect().await;
                        },
                        DeviceCommand::RefreshDevices => {
                            if let Err(err) = manager.refresh_devices().await {
                                warn!("Failed to enumerate paired devices: {}", err);
                            }
                        },
                    }
                },
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
            }
        }

        manager.disconnect().await;
    });

    (command_sender, handle)
}
