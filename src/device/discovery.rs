use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address, Session};
use log::{info, warn};

use crate::device::constants::{make_spp_service_uuid, SPP_CHANNEL};
use crate::device::manager::BluetoothStack;
use crate::device::transport::CommandSink;
use crate::device::types::PairedDevice;
use crate::error::DeviceError;

/// The BlueZ bluetooth stack. Owns the D-Bus session and the default adapter.
pub struct Bluetooth {
    _session: Session,
    adapter: Adapter,
}

impl Bluetooth {
    /// Open a session on the first available adapter. A powered-off adapter
    /// is powered on; if that is not possible the condition is surfaced as
    /// [`DeviceError::AdapterDisabled`] and the user resolves it out of band.
    pub async fn new() -> Result<Self, DeviceError> {
        let session = Session::new().await?;

        let adapter_names = session.adapter_names().await?;
        let adapter_name = adapter_names.first().ok_or(DeviceError::NoAdapter)?;
        let adapter = session.adapter(adapter_name)?;

        if !adapter.is_powered().await? {
            info!("Bluetooth adapter {} is powered off, trying to power it on", adapter.name());
            if let Err(err) = adapter.set_powered(true).await {
                warn!("Failed to power on adapter: {:?}", err);
                return Err(DeviceError::AdapterDisabled);
            }
        }

        info!("Using bluetooth adapter {}", adapter.name());
        Ok(Bluetooth { _session: session, adapter })
    }
}

#[async_trait]
impl BluetoothStack for Bluetooth {
    /// The adapter's bonded devices, in whatever order BlueZ enumerates them.
    /// No inquiry scan is started for this; bonded devices are known to the
    /// adapter without one.
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError> {
        let spp_service = make_spp_service_uuid();
        let mut devices = Vec::new();

        for address in self.adapter.device_addresses().await? {
            let device = match self.adapter.device(address) {
                Ok(device) => device,
                Err(err) => {
                    warn!("Failed to resolve device {}: {:?}", address, err);
                    continue;
                },
            };

            match device.is_paired().await {
                Ok(true) => {},
                Ok(false) => continue,
                Err(err) => {
                    warn!("Failed to query pairing state of {}: {:?}", address, err);
                    continue;
                },
            }

            let name = device.name().await.ok().flatten();
            let has_spp = device
                .uuids()
                .await
                .ok()
                .flatten()
                .map(|uuids| uuids.contains(&spp_service))
                .unwrap_or(false);

            devices.push(PairedDevice { address, name, has_spp });
        }

        Ok(devices)
    }

    /// Dial the serial port service. SPP modules put it on a fixed RFCOMM
    /// channel, so this connects by channel rather than running an SDP query.
    async fn open_rfcomm(&self, address: Address) -> Result<CommandSink, DeviceError> {
        let target = SocketAddr::new(address, SPP_CHANNEL);

        info!("Opening RFCOMM channel {} to {}", SPP_CHANNEL, address);
        let stream = Stream::connect(target)
            .await
            .map_err(|source| DeviceError::Connect { source })?;

        Ok(Box::new(stream))
    }
}
