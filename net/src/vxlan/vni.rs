// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use core::fmt::Display;
use std::fmt::Formatter;

/// A [VXLAN][RFC7348] Network Identifier.
///
/// A `Vni` is a 24-bit value that identifies a VXLAN [overlay network].
///
/// According to <cite>[RFC7348]</cite>:
///
/// > VXLAN Segment ID/VXLAN Network Identifier (VNI): this is a 24-bit value used to designate the
/// > individual VXLAN overlay network on which the communicating VMs are situated.
///
/// # Legal values
///
/// Any value in `0..=0x00_FF_FF_FF`.
/// Unlike EVPN control planes, the switch datapath treats tunnel id `0` as an ordinary key, so
/// zero is accepted here.
///
/// A `Vni` cannot be created from a `u32` directly.
/// Use [`Vni::new_checked`] (or the `TryFrom` impls) instead.
///
/// [RFC7348]: https://datatracker.ietf.org/doc/html/rfc7348#section-5
/// [overlay network]: https://en.wikipedia.org/wiki/Overlay_network
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(transparent)]
pub struct Vni(u32);

impl Display for Vni {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Vni {
    /// The maximum legal [`Vni`] value (2<sup>24</sup> - 1).
    pub const MAX: u32 = 0x00_FF_FF_FF;

    /// Create a new [`Vni`] from a `u32`.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidVni`] error if the value is greater than [`Vni::MAX`].
    pub const fn new_checked(vni: u32) -> Result<Vni, InvalidVni> {
        if vni > Vni::MAX {
            return Err(InvalidVni::TooLarge(vni as u64));
        }
        Ok(Vni(vni))
    }

    /// Recover a [`Vni`] from the second 32-bit word of a VXLAN header (in host order).
    ///
    /// The low 8 bits are reserved and are discarded.
    #[must_use]
    pub const fn from_header_word(word: u32) -> Vni {
        Vni(word >> 8)
    }

    /// The second 32-bit word of a VXLAN header (in host order) carrying this [`Vni`].
    #[must_use]
    pub const fn header_word(self) -> u32 {
        self.0 << 8
    }

    /// Get the value of the [`Vni`] as a `u32`.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Errors that can occur when converting an integer to a [`Vni`]
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, thiserror::Error)]
pub enum InvalidVni {
    /// This error type contains the (illegal) value used to attempt creation of a [`Vni`].
    /// The max legal value is found in [`Vni::MAX`].
    #[error("The value {0} is too large to be a Vni (max is {MAX})", MAX = Vni::MAX)]
    TooLarge(u64),
}

impl From<Vni> for u32 {
    fn from(vni: Vni) -> u32 {
        vni.as_u32()
    }
}

impl From<Vni> for u64 {
    fn from(vni: Vni) -> u64 {
        u64::from(vni.as_u32())
    }
}

impl TryFrom<u32> for Vni {
    type Error = InvalidVni;

    fn try_from(vni: u32) -> Result<Vni, Self::Error> {
        Vni::new_checked(vni)
    }
}

impl TryFrom<u64> for Vni {
    type Error = InvalidVni;

    /// Tunnel ids travel as 64-bit values; only the low 24 bits are meaningful for VXLAN.
    fn try_from(tunnel_id: u64) -> Result<Vni, Self::Error> {
        match u32::try_from(tunnel_id) {
            Ok(raw) => Vni::new_checked(raw),
            Err(_) => Err(InvalidVni::TooLarge(tunnel_id)),
        }
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::vxlan::Vni;
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for Vni {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            let raw: u32 = u.produce::<u32>()? & Vni::MAX;
            Some(Vni::new_checked(raw).unwrap_or_else(|e| unreachable!("{e:?}")))
        }
    }
}
