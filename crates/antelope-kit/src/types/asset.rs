//! Token symbols and asset amounts.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Name;
use crate::error::ParseAssetError;

/// Maximum decimal precision of a symbol.
pub const MAX_PRECISION: u8 = 18;

/// A symbol code such as `TOK` (up to 7 uppercase letters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolCode(u64);

impl SymbolCode {
    /// Create from the raw 64-bit value.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw 64-bit value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl FromStr for SymbolCode {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 7 || !s.bytes().all(|c| c.is_ascii_uppercase()) {
            return Err(ParseAssetError::InvalidSymbolCode(s.to_string()));
        }
        let value = s
            .bytes()
            .enumerate()
            .fold(0u64, |acc, (i, c)| acc | ((c as u64) << (8 * i)));
        Ok(Self(value))
    }
}

impl Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut v = self.0;
        while v != 0 {
            write!(f, "{}", (v & 0xff) as u8 as char)?;
            v >>= 8;
        }
        Ok(())
    }
}

impl Debug for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolCode({})", self)
    }
}

/// A symbol: precision plus code, written `4,TOK`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    precision: u8,
    code: SymbolCode,
}

impl Symbol {
    /// Create a symbol.
    pub fn new(precision: u8, code: SymbolCode) -> Result<Self, ParseAssetError> {
        if precision > MAX_PRECISION {
            return Err(ParseAssetError::PrecisionTooLarge(precision));
        }
        Ok(Self { precision, code })
    }

    /// Create from the packed 64-bit value (precision in the low byte).
    pub fn from_u64(value: u64) -> Result<Self, ParseAssetError> {
        Self::new((value & 0xff) as u8, SymbolCode(value >> 8))
    }

    /// The packed 64-bit value.
    pub fn as_u64(&self) -> u64 {
        (self.code.0 << 8) | self.precision as u64
    }

    /// Number of decimal places.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// The symbol code.
    pub fn code(&self) -> SymbolCode {
        self.code
    }
}

impl FromStr for Symbol {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| ParseAssetError::InvalidSymbol(s.to_string()))?;
        let precision: u8 = precision
            .trim()
            .parse()
            .map_err(|_| ParseAssetError::InvalidSymbol(s.to_string()))?;
        Self::new(precision, code.trim().parse()?)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

/// A token amount with its symbol, written `1.0000 TOK`.
///
/// # Example
///
/// ```
/// use antelope_kit::Asset;
///
/// let asset: Asset = "1.0000 TOK".parse().unwrap();
/// assert_eq!(asset.amount(), 10000);
/// assert_eq!(asset.symbol().precision(), 4);
/// assert_eq!(asset.to_string(), "1.0000 TOK");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asset {
    amount: i64,
    symbol: Symbol,
}

impl Asset {
    /// Create from raw amount (in the smallest unit) and symbol.
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    /// Raw amount in the smallest unit.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// The symbol.
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }
}

impl FromStr for Asset {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, code) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| ParseAssetError::InvalidFormat(s.to_string()))?;
        let code: SymbolCode = code.trim().parse()?;

        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty()
            || !whole.bytes().all(|c| c.is_ascii_digit())
            || !fraction.bytes().all(|c| c.is_ascii_digit())
        {
            return Err(ParseAssetError::InvalidNumber(number.to_string()));
        }

        let precision =
            u8::try_from(fraction.len()).map_err(|_| ParseAssetError::PrecisionTooLarge(u8::MAX))?;
        let symbol = Symbol::new(precision, code)?;

        let magnitude: i64 = format!("{}{}", whole, fraction)
            .parse()
            .map_err(|_| ParseAssetError::Overflow)?;
        let amount = if negative { -magnitude } else { magnitude };

        Ok(Self { amount, symbol })
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.symbol.precision as u32;
        let sign = if self.amount < 0 { "-" } else { "" };
        let magnitude = self.amount.unsigned_abs();
        if precision == 0 {
            return write!(f, "{}{} {}", sign, magnitude, self.symbol.code);
        }
        let scale = 10u64.pow(precision);
        write!(
            f,
            "{}{}.{:0width$} {}",
            sign,
            magnitude / scale,
            magnitude % scale,
            self.symbol.code,
            width = precision as usize
        )
    }
}

impl Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({})", self)
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An asset together with the token contract that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedAsset {
    pub quantity: Asset,
    pub contract: Name,
}
