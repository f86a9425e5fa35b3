//! 2.4 GHz Wi-Fi channels and the range of channels a scan covers

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Lowest channel number in the 2.4 GHz band
pub const MIN_CHANNEL: u8 = 1;

/// Highest channel number in the 2.4 GHz band (channel 14 is Japan only)
pub const MAX_CHANNEL: u8 = 14;

/// Number of channels in the band
pub const CHANNEL_COUNT: usize = MAX_CHANNEL as usize;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel {channel} outside 1..=14")]
    OutOfRange { channel: u8 },

    #[error("Channel plan must end between 1 and 14, got {last}")]
    InvalidPlan { last: u8 },
}

/// A validated 2.4 GHz channel number (1 to 14)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    pub const ONE: Self = Self(MIN_CHANNEL);

    pub const fn new(channel: u8) -> Result<Self, ChannelError> {
        if channel >= MIN_CHANNEL && channel <= MAX_CHANNEL {
            Ok(Self(channel))
        } else {
            Err(ChannelError::OutOfRange { channel })
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Channel> for u8 {
    fn from(value: Channel) -> Self {
        value.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of channels swept by a scan, always starting at channel 1.
///
/// The upper bound depends on the regulatory domain: 13 for most of the
/// world, 14 in Japan, 11 in North America.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPlan {
    last: Channel,
}

impl ChannelPlan {
    /// Channels 1 to 11
    pub const NORTH_AMERICA: Self = Self { last: Channel(11) };
    /// Channels 1 to 13
    pub const WORLD: Self = Self { last: Channel(13) };
    /// Channels 1 to 14
    pub const JAPAN: Self = Self { last: Channel(14) };

    pub const fn new(last: u8) -> Result<Self, ChannelError> {
        match Channel::new(last) {
            Ok(last) => Ok(Self { last }),
            Err(_) => Err(ChannelError::InvalidPlan { last }),
        }
    }

    /// The lowest channel of the plan. It has no lower neighbour.
    pub const fn first(&self) -> Channel {
        Channel::ONE
    }

    pub const fn last(&self) -> Channel {
        self.last
    }

    pub const fn len(&self) -> usize {
        self.last.0 as usize
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn contains(&self, channel: Channel) -> bool {
        channel.0 <= self.last.0
    }

    /// Channels in ascending scan order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Channel> + ExactSizeIterator {
        (MIN_CHANNEL..=self.last.0).map(Channel)
    }
}

impl Default for ChannelPlan {
    fn default() -> Self {
        Self::WORLD
    }
}
