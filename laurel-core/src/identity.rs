//! Identity types for Laurel entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a locally signed-in user.
///
/// One achievement cache exists per Xuid. The value is opaque to the engine;
/// it is only compared, hashed, and ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Xuid(u64);

impl Xuid {
    /// Wrap a raw user id.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw user id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Xuid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Xuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Xuid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Xuid)
            .map_err(|_| format!("Invalid Xuid: {}", s))
    }
}

/// Token identifying one registered real-time handler.
///
/// Tokens are unique per `RealTimeActivity` instance and are handed back to
/// remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
