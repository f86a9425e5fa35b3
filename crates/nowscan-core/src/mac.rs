//! Hardware (MAC) addresses of radio endpoints

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Length of a hardware address in bytes
pub const MAC_LEN: usize = 6;

/// A 6-byte hardware address identifying a radio endpoint.
///
/// Displayed as lowercase colon separated hex (`24:0a:c4:12:34:56`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`
    pub const BROADCAST: Self = Self([0xff; MAC_LEN]);

    pub const fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }

    pub const fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Multicast bit of the first octet. Unicast addresses clear it.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl From<[u8; MAC_LEN]> for MacAddress {
    fn from(value: [u8; MAC_LEN]) -> Self {
        Self(value)
    }
}

impl From<MacAddress> for [u8; MAC_LEN] {
    fn from(value: MacAddress) -> Self {
        value.0
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = MacParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; MAC_LEN] = value
            .try_into()
            .map_err(|_| MacParseError::Length { found: value.len() })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Errors produced while parsing a textual hardware address
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MacParseError {
    #[error("Expected 6 address bytes, found {found}")]
    Length { found: usize },

    #[error("Invalid hex digit '{digit}'")]
    InvalidDigit { digit: char },

    #[error("Mixed or misplaced separators")]
    Separator,
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// The character of `text` that covers byte offset `at`
fn char_at(text: &str, at: usize) -> char {
    text.char_indices()
        .take_while(|&(i, _)| i <= at)
        .last()
        .map_or(char::REPLACEMENT_CHARACTER, |(_, c)| c)
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` and `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let raw = text.as_bytes();
        let digit = |at: usize| {
            hex_value(raw[at]).ok_or_else(|| MacParseError::InvalidDigit {
                digit: char_at(text, at),
            })
        };

        let separator = match raw.get(2) {
            Some(b':') => Some(b':'),
            Some(b'-') => Some(b'-'),
            _ => None,
        };

        let stride = if separator.is_some() { 3 } else { 2 };
        let expected_len = match separator {
            Some(_) => MAC_LEN * 3 - 1,
            None => MAC_LEN * 2,
        };
        if raw.len() != expected_len {
            let found = (raw.len() + stride - 1) / stride;
            return Err(MacParseError::Length { found });
        }

        let mut bytes = [0u8; MAC_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let at = i * stride;
            *byte = (digit(at)? << 4) | digit(at + 1)?;
            if let Some(sep) = separator {
                if i + 1 < MAC_LEN && raw[at + 2] != sep {
                    return Err(MacParseError::Separator);
                }
            }
        }

        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_parse_colon_separated() {
        let mac: MacAddress = "24:0A:c4:12:34:56".parse().unwrap();
        assert_eq!(mac.octets(), [0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_parse_dash_and_bare() {
        let dashed: MacAddress = "24-0a-c4-12-34-56".parse().unwrap();
        let bare: MacAddress = "240ac4123456".parse().unwrap();
        assert_eq!(dashed, bare);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            "24:0a:c4:12:34".parse::<MacAddress>(),
            Err(MacParseError::Length { found: 5 })
        );
        assert_eq!(
            "24:0a:c4:12:34:5g".parse::<MacAddress>(),
            Err(MacParseError::InvalidDigit { digit: 'g' })
        );
        assert_eq!(
            "24:0a-c4:12:34:56".parse::<MacAddress>(),
            Err(MacParseError::Separator)
        );
    }

    #[test]
    fn test_invalid_digit_reports_whole_character() {
        // 'é' is two bytes, so the text has the length of a valid address
        assert_eq!(
            "24:0a:c4:12:34:é".parse::<MacAddress>(),
            Err(MacParseError::InvalidDigit { digit: 'é' })
        );
    }

    #[test]
    fn test_display_is_lowercase_colon_hex() {
        let mac = MacAddress::new([0xAA, 0xBB, 0x0C, 0x01, 0x02, 0xFF]);
        assert_eq!(mac.to_string(), "aa:bb:0c:01:02:ff");
        assert_eq!(mac.to_string().parse::<MacAddress>().unwrap(), mac);
    }

    #[test]
    fn test_broadcast_and_multicast() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::BROADCAST.is_multicast());
        assert!(!MacAddress::new([0x24, 0, 0, 0, 0, 1]).is_multicast());
    }

    #[test]
    fn test_from_slice() {
        let bytes = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(MacAddress::try_from(&bytes[..]).unwrap().octets(), bytes);
        assert_eq!(
            MacAddress::try_from(&bytes[..4]),
            Err(MacParseError::Length { found: 4 })
        );
    }
}
