// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::parse::{Parse, ParseError};
use crate::udp::UDP_HEADER_LEN;
use crate::vxlan::{Vxlan, VxlanError};
use etherparse::{IpNumber, Ipv4Slice, UdpHeaderSlice};
use std::net::Ipv4Addr;

/// Fields of the outer IPv4 header which are preserved across decapsulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterIpv4 {
    /// Remote tunnel endpoint.
    pub source: Ipv4Addr,
    /// Local tunnel endpoint.
    pub destination: Ipv4Addr,
    /// Type of service (DSCP and ECN).
    pub tos: u8,
    /// Time to live.
    pub ttl: u8,
}

/// A parsed underlay datagram: outer headers and where the inner frame starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VxlanDecap {
    /// The outer IPv4 header.
    pub outer: OuterIpv4,
    /// UDP source port.
    pub src_port: u16,
    /// UDP destination port.
    pub dst_port: u16,
    /// The VXLAN header.
    pub vxlan: Vxlan,
    /// Offset of the inner Ethernet frame in the datagram.
    pub inner_offset: usize,
    /// End of the inner Ethernet frame. Bytes past the IPv4 total length are not part of it.
    pub inner_end: usize,
}

/// Reasons an underlay datagram is not a VXLAN packet we can decapsulate.
#[derive(Debug, thiserror::Error)]
pub enum VxlanDecapError {
    /// The outer IPv4 header is illegal, or the datagram is shorter than its total length.
    #[error("bad outer ipv4 packet: {0}")]
    Ipv4(#[from] etherparse::err::ipv4::SliceError),
    /// The outer packet is an IP fragment. Reassembly is not supported.
    #[error("outer ipv4 packet is fragmented")]
    Fragmented,
    /// The outer packet does not carry UDP.
    #[error("outer ipv4 protocol {0} is not udp")]
    NotUdp(u8),
    /// The UDP header is truncated.
    #[error("bad udp header: {0}")]
    Udp(#[from] etherparse::err::LenError),
    /// The UDP length disagrees with the IPv4 payload length.
    #[error("udp length {udp} does not match ipv4 payload length {ip}")]
    UdpLength {
        /// Length in the UDP header.
        udp: u16,
        /// IPv4 payload length.
        ip: usize,
    },
    /// The VXLAN header is truncated or illegal.
    #[error("bad vxlan header: {0}")]
    Vxlan(#[from] ParseError<VxlanError>),
}

impl VxlanDecap {
    /// Parse an underlay IPv4 datagram (starting at the IPv4 header) carrying VXLAN.
    ///
    /// Only header fields are inspected; the inner frame is located but not parsed. The IPv4
    /// total length bounds the datagram, trailing link layer padding is excluded from the inner
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns a [`VxlanDecapError`] describing the first header which could not be parsed.
    pub fn parse(datagram: &[u8]) -> Result<Self, VxlanDecapError> {
        let ipv4 = Ipv4Slice::from_slice(datagram)?;
        let ip = ipv4.header();
        if ip.more_fragments() || ip.fragments_offset().value() != 0 {
            return Err(VxlanDecapError::Fragmented);
        }
        if ip.protocol() != IpNumber::UDP {
            return Err(VxlanDecapError::NotUdp(ip.protocol().0));
        }
        let outer = OuterIpv4 {
            source: ip.source_addr(),
            destination: ip.destination_addr(),
            tos: (ip.dcp().value() << 2) | ip.ecn().value(),
            ttl: ip.ttl(),
        };
        let ip_len = ip.slice().len();
        let payload = ipv4.payload().payload;

        let udp = UdpHeaderSlice::from_slice(payload)?;
        if usize::from(udp.length()) != payload.len() {
            return Err(VxlanDecapError::UdpLength {
                udp: udp.length(),
                ip: payload.len(),
            });
        }
        let vxlan_offset = ip_len + UDP_HEADER_LEN;
        let (vxlan, consumed) = Vxlan::parse(&payload[UDP_HEADER_LEN..])?;

        Ok(Self {
            outer,
            src_port: udp.source_port(),
            dst_port: udp.destination_port(),
            vxlan,
            inner_offset: vxlan_offset + consumed.get(),
            inner_end: ip_len + payload.len(),
        })
    }
}
