//! Human-readable byte sizes for configuration values ("100MB", "2G", 1024)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Size overflows u64: {0}")]
    Overflow(String),
}

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Byte count that deserializes from either an integer or a suffixed string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn mib(n: u64) -> Self {
        ByteSize(n * MIB)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Formats the size the way the extractor's `--max-filesize` flag expects
    /// it (largest whole binary unit, single-letter suffix).
    pub fn to_extractor_arg(&self) -> String {
        match self.0 {
            0 => "0".to_string(),
            n if n % GIB == 0 => format!("{}G", n / GIB),
            n if n % MIB == 0 => format!("{}M", n / MIB),
            n if n % KIB == 0 => format!("{}K", n / KIB),
            n => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match SizeRepr::deserialize(deserializer)? {
            SizeRepr::Bytes(n) => Ok(ByteSize(n)),
            SizeRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        if digits.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let value: u64 = digits.parse()?;
        let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };

        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.to_extractor_arg())
    }
}
