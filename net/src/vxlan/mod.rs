// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! [VXLAN][RFC7348] types, parsing and underlay encapsulation.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |R|R|R|R|I|R|R|R|            Reserved                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                VXLAN Network Identifier (VNI) |   Reserved    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! [RFC7348]: https://datatracker.ietf.org/doc/html/rfc7348#section-5

mod decap;
mod encap;
mod vni;

use crate::parse::{DeParse, DeParseError, LengthError, Parse, ParseError};
use core::num::NonZero;
use tracing::trace;

pub use decap::{OuterIpv4, VxlanDecap, VxlanDecapError};
pub use encap::{VxlanEncap, VxlanEncapError};
pub use vni::{InvalidVni, Vni};

/// A [VXLAN] header
///
/// [VXLAN]: https://en.wikipedia.org/wiki/Virtual_Extensible_LAN
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub struct Vxlan {
    vni: Vni,
}

impl Vxlan {
    /// IANA assigned VXLAN UDP port.
    pub const PORT: u16 = 4789;

    /// The minimum (and maximum) length of a [`Vxlan`] header.
    #[allow(clippy::unwrap_used)] // trivially safe const expression
    pub const MIN_LENGTH: NonZero<usize> = NonZero::new(8).unwrap();

    /// The only legal set of flags for a VXLAN header.
    ///
    /// From the [IETF vxlan spec (aka RFC7348)](https://datatracker.ietf.org/doc/html/rfc7348#section-5)
    ///
    /// > Flags (8-bits): where the I flag MUST be set to 1 for a valid VXLAN Network ID (VNI).
    /// > The other 7-bits (designated "R") are reserved fields and MUST be set to zero on
    /// > transmission and ignored on receipt.
    pub const LEGAL_FLAGS: u8 = 0b0000_1000;

    /// Create a new VXLAN header.
    #[must_use]
    pub const fn new(vni: Vni) -> Vxlan {
        Vxlan { vni }
    }

    /// Get the [`Vni`] of this header.
    #[must_use]
    pub const fn vni(&self) -> Vni {
        self.vni
    }

    /// Set the [`Vni`] of this header.
    pub const fn set_vni(&mut self, vni: Vni) -> &mut Vxlan {
        self.vni = vni;
        self
    }
}

/// Errors which may occur when parsing a [`Vxlan`] header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VxlanError {
    /// [The VXLAN spec] requires a specific flag to be set in the first byte of the header.
    /// This error will result if that bit is not set.
    ///
    /// [The VXLAN spec]: https://datatracker.ietf.org/doc/html/rfc7348#section-5
    #[error("VNI flag (I) is not set")]
    RequiredBitUnset,
}

impl Parse for Vxlan {
    type Error = VxlanError;

    fn parse(buf: &[u8]) -> Result<(Self, NonZero<usize>), ParseError<Self::Error>> {
        if buf.len() < Vxlan::MIN_LENGTH.get() {
            return Err(ParseError::Length(LengthError {
                expected: Vxlan::MIN_LENGTH,
                actual: buf.len(),
            }));
        }
        let slice = &buf[..Vxlan::MIN_LENGTH.get()];
        if slice[0] & Vxlan::LEGAL_FLAGS != Vxlan::LEGAL_FLAGS {
            return Err(ParseError::Invalid(VxlanError::RequiredBitUnset));
        }
        if slice[0] != Vxlan::LEGAL_FLAGS {
            trace!(
                "Received VXLAN header with illegal flags: {flags:#010b}, ignoring",
                flags = slice[0]
            );
        }
        if slice[1..=3] != [0, 0, 0] || slice[7] != 0 {
            trace!("Received VXLAN header with reserved bits set, ignoring");
        }
        let word: [u8; 4] = slice[4..8].try_into().unwrap_or_else(|_| unreachable!());
        let vni = Vni::from_header_word(u32::from_be_bytes(word));
        Ok((Vxlan { vni }, Vxlan::MIN_LENGTH))
    }
}

impl DeParse for Vxlan {
    type Error = ();

    fn size(&self) -> NonZero<usize> {
        Vxlan::MIN_LENGTH
    }

    fn deparse(&self, buf: &mut [u8]) -> Result<NonZero<usize>, DeParseError<Self::Error>> {
        if buf.len() < Vxlan::MIN_LENGTH.get() {
            return Err(DeParseError::Length(LengthError {
                expected: Vxlan::MIN_LENGTH,
                actual: buf.len(),
            }));
        }
        buf[0] = Vxlan::LEGAL_FLAGS;
        buf[1..=3].copy_from_slice(&[0, 0, 0]);
        buf[4..8].copy_from_slice(&self.vni.header_word().to_be_bytes());
        Ok(Vxlan::MIN_LENGTH)
    }
}
