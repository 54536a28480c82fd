// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Inclusive range of ephemeral UDP ports from which underlay source ports are drawn.
///
/// Serialized as a two element array, the same shape as `net.ipv4.ip_local_port_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u16; 2]", into = "[u16; 2]")]
pub struct LocalPortRange {
    min: u16,
    max: u16,
}

/// The requested bounds do not form a usable port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid local port range {min}..={max}")]
pub struct InvalidPortRange {
    /// Requested lower bound.
    pub min: u16,
    /// Requested upper bound.
    pub max: u16,
}

impl LocalPortRange {
    /// Default Linux ephemeral range.
    pub const DEFAULT: LocalPortRange = LocalPortRange {
        min: 32768,
        max: 60999,
    };

    /// Build a new range.
    ///
    /// # Errors
    ///
    /// Fails if `min` is zero or greater than `max`.
    pub const fn new(min: u16, max: u16) -> Result<Self, InvalidPortRange> {
        if min == 0 || min > max {
            return Err(InvalidPortRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lowest port in the range.
    #[must_use]
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Highest port in the range.
    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports in the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.max as u32 - self.min as u32 + 1
    }

    /// A valid range is never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// True if `port` belongs to the range.
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }

    /// Map a 32-bit hash onto the range.
    ///
    /// Uses a multiply-shift reduction, which keeps a uniform hash uniform over the range
    /// without the bias of a modulo.
    #[must_use]
    pub fn pick(&self, hash: u32) -> u16 {
        let offset = (u64::from(hash) * u64::from(self.len())) >> 32;
        #[allow(clippy::cast_possible_truncation)] // offset < len <= 2^16
        let offset = offset as u16;
        self.min + offset
    }
}

impl Default for LocalPortRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<[u16; 2]> for LocalPortRange {
    type Error = InvalidPortRange;

    fn try_from([min, max]: [u16; 2]) -> Result<Self, Self::Error> {
        LocalPortRange::new(min, max)
    }
}

impl From<LocalPortRange> for [u16; 2] {
    fn from(range: LocalPortRange) -> Self {
        [range.min, range.max]
    }
}

impl Display for LocalPortRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}
