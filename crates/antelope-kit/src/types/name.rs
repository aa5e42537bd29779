//! Account, action, permission and table names.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseNameError;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// Maximum number of characters in a name.
pub const MAX_NAME_LEN: usize = 13;

/// A 64-bit encoded name (`eosio.token`, `transfer`, `active`, ...).
///
/// Names use the base-32 alphabet `.12345abcdefghijklmnopqrstuvwxyz`, are at most
/// 13 characters long, and the 13th character only has 4 bits available.
///
/// # Example
///
/// ```
/// use antelope_kit::Name;
///
/// let name: Name = "eosio.token".parse().unwrap();
/// assert_eq!(name.as_u64(), 0x5530ea033482a600);
/// assert_eq!(name.to_string(), "eosio.token");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(u64);

impl Name {
    /// The empty name (value 0).
    pub const EMPTY: Self = Self(0);

    /// Create from the raw 64-bit value.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw 64-bit value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is the empty name.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

fn symbol_value(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for Name {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_NAME_LEN {
            return Err(ParseNameError::TooLong(s.to_string()));
        }

        let mut value = 0u64;
        for (i, c) in s.bytes().enumerate() {
            let symbol = symbol_value(c)
                .ok_or_else(|| ParseNameError::InvalidChar(s.to_string(), c as char))?;

            if i < 12 {
                value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if symbol > 0x0f {
                    return Err(ParseNameError::InvalidLastChar(s.to_string()));
                }
                value |= symbol;
            }
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for Name {
    type Error = ParseNameError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<u64> for Name {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_NAME_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_NAME_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }

        let end = out
            .iter()
            .rposition(|&c| c != b'.')
            .map(|p| p + 1)
            .unwrap_or(0);
        // CHARMAP is ASCII
        f.write_str(std::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
