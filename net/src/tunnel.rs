// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-packet tunnel metadata.

use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

bitflags::bitflags! {
    /// Tunnel flags carried in a [`TunnelKey`].
    ///
    /// Values match the Linux `TUNNEL_*` flags so keys can be exchanged with the rest of the
    /// switch without translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TunnelFlags: u16 {
        /// Outer checksum requested.
        const CSUM = 0x0001;
        /// Routing present.
        const ROUTING = 0x0002;
        /// The tunnel id is meaningful.
        const KEY = 0x0004;
        /// Sequence number present.
        const SEQ = 0x0008;
        /// Set the "don't fragment" bit in the outer IPv4 header.
        const DONT_FRAGMENT = 0x0100;
    }
}

/// Underlay addressing and tunnel id of a single packet.
///
/// A key is attached to a packet on decapsulation and consumed on encapsulation. It is built
/// once and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelKey {
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    tunnel_id: u64,
    tos: u8,
    ttl: u8,
    flags: TunnelFlags,
}

impl TunnelKey {
    /// Build a new [`TunnelKey`].
    #[must_use]
    pub const fn new(
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        tunnel_id: u64,
        tos: u8,
        ttl: u8,
        flags: TunnelFlags,
    ) -> Self {
        Self {
            src_addr,
            dst_addr,
            tunnel_id,
            tos,
            ttl,
            flags,
        }
    }

    /// Outer source address. On transmit this is only a hint for the route lookup.
    #[must_use]
    pub const fn src_addr(&self) -> Ipv4Addr {
        self.src_addr
    }

    /// Outer destination address.
    #[must_use]
    pub const fn dst_addr(&self) -> Ipv4Addr {
        self.dst_addr
    }

    /// Tunnel id. Only the low 24 bits are meaningful for VXLAN.
    #[must_use]
    pub const fn tunnel_id(&self) -> u64 {
        self.tunnel_id
    }

    /// Outer type of service (DSCP and ECN).
    #[must_use]
    pub const fn tos(&self) -> u8 {
        self.tos
    }

    /// Outer time to live.
    #[must_use]
    pub const fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Tunnel flags.
    #[must_use]
    pub const fn flags(&self) -> TunnelFlags {
        self.flags
    }

    /// True if the outer header must carry the "don't fragment" bit.
    #[must_use]
    pub const fn dont_fragment(&self) -> bool {
        self.flags.contains(TunnelFlags::DONT_FRAGMENT)
    }
}

impl Display for TunnelKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} id {} tos {:#04x} ttl {} flags {:?}",
            self.src_addr, self.dst_addr, self.tunnel_id, self.tos, self.ttl, self.flags
        )
    }
}
