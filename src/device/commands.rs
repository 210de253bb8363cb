//! The wire commands understood by the prop.
//!
//! This is the single place where the command syntax is specified and it must
//! match the program living on the prop's arduino.

/// A controllable light channel on the prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Soulstone,
    Eyes,
    Mouth,
    Variation,
    BaselineSync,
}

pub const CHANNELS: [Channel; 5] = [
    Channel::Soulstone,
    Channel::Eyes,
    Channel::Mouth,
    Channel::Variation,
    Channel::BaselineSync,
];

impl Channel {
    /// The single-character key used on the wire.
    pub fn key(self) -> char {
        match self {
            Channel::Soulstone => 's',
            Channel::Eyes => 'e',
            Channel::Mouth => 'm',
            Channel::Variation => 'v',
            Channel::BaselineSync => 'b',
        }
    }

    /// Inverse of [`Channel::key`], for parsing user input.
    pub fn from_key(key: &str) -> Option<Channel> {
        match key {
            "s" => Some(Channel::Soulstone),
            "e" => Some(Channel::Eyes),
            "m" => Some(Channel::Mouth),
            "v" => Some(Channel::Variation),
            "b" => Some(Channel::BaselineSync),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Soulstone => "soulstone",
            Channel::Eyes => "eyes",
            Channel::Mouth => "mouth",
            Channel::Variation => "variation",
            Channel::BaselineSync => "baseline sync",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn every light off, regardless of the current channel levels.
    Off,
    /// Set one channel to an intensity in 0..=255.
    Set(Channel, u8),
}

impl Command {
    /// Encode as a newline-terminated ASCII line. The prop detects command
    /// boundaries by the trailing '\n'.
    pub fn encode(&self) -> String {
        match self {
            Command::Off => "off\n".to_string(),
            Command::Set(channel, value) => format!("{}={}\n", channel.key(), value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_commands_use_the_fixed_channel_keys() {
        assert_eq!(Command::Set(Channel::Soulstone, 200).encode(), "s=200\n");
        assert_eq!(Command::Set(Channel::Eyes, 0).encode(), "e=0\n");
        assert_eq!(Command::Set(Channel::Mouth, 255).encode(), "m=255\n");
        assert_eq!(Command::Set(Channel::Variation, 17).encode(), "v=17\n");
        assert_eq!(Command::Set(Channel::BaselineSync, 128).encode(), "b=128\n");
    }

    #[test]
    fn every_channel_has_a_distinct_key() {
        for (i, a) in CHANNELS.iter().enumerate() {
            for b in &CHANNELS[i + 1..] {
                assert_ne!(a.key(), b.key());
            }
        }
    }

    #[test]
    fn from_key_is_the_inverse_of_key() {
        for channel in CHANNELS {
            assert_eq!(Channel::from_key(&channel.key().to_string()), Some(channel));
        }
        assert_eq!(Channel::from_key("x"), None);
        assert_eq!(Channel::from_key(""), None);
    }

    #[test]
    fn off_is_a_fixed_literal() {
        assert_eq!(Command::Off.encode(), "off\n");
    }

    #[test]
    fn values_are_plain_decimal_without_padding() {
        assert_eq!(Command::Set(Channel::Soulstone, 7).encode(), "s=7\n");
        assert_eq!(Command::Set(Channel::Soulstone, 42).encode(), "s=42\n");
    }
}
