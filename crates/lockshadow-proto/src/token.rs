//! Client token.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtoError;

/// Correlation id attached to every outbound shadow update.
///
/// Derived from the device tick counter and folded into six decimal digits so
/// it always fits the fixed-width `"clientToken"` field. It only correlates
/// log lines with acknowledgments; delta acceptance is gated by
/// [`ShadowVersion`](crate::ShadowVersion) alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientToken(u32);

impl ClientToken {
    /// Exclusive upper bound of the token space.
    pub const MODULUS: u32 = 1_000_000;

    /// Number of digits in the wire form.
    pub const WIDTH: usize = 6;

    /// Fold a tick count into a token.
    pub fn from_ticks(ticks: u64) -> Self {
        // Remainder is < 1_000_000, always fits.
        Self((ticks % u64::from(Self::MODULUS)) as u32)
    }

    /// Build a token from a value already in range.
    pub fn new(value: u32) -> Result<Self, ProtoError> {
        if value < Self::MODULUS {
            Ok(Self(value))
        } else {
            Err(ProtoError::InvalidClientToken(value.to_string()))
        }
    }

    /// Numeric value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for ClientToken {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtoError::InvalidClientToken(s.to_string()));
        }
        s.parse::<u32>().map(Self).map_err(|_| ProtoError::InvalidClientToken(s.to_string()))
    }
}

impl Serialize for ClientToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClientToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
