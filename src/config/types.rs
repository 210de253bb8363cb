use serde::{Deserialize, Serialize};

use crate::device::types::ChannelLevels;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Address of the prop to connect to. When unset, auto-connect picks the
    /// first paired device.
    pub device_address: Option<String>,
    pub auto_connect: bool,
    /// Channel levels applied at startup and pushed on the first connect.
    pub levels: ChannelLevels,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_address: None,
            auto_connect: true,
            levels: ChannelLevels::default(),
        }
    }
}
