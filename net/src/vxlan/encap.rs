// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::parse::DeParse;
use crate::udp::UDP_HEADER_LEN;
use crate::vxlan::{InvalidVni, Vni, Vxlan};
use bytes::{BufMut, BytesMut};
use etherparse::{IpDscp, IpEcn, IpNumber, Ipv4Header, UdpHeader};
use std::net::Ipv4Addr;

const ECN_MASK: u8 = 0b11;

/// Parameters of the underlay headers wrapped around an inner frame.
///
/// The UDP checksum is always transmitted as zero, as RFC 7348 recommends for IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VxlanEncap {
    /// Outer source address (the local tunnel endpoint).
    pub source: Ipv4Addr,
    /// Outer destination address (the remote tunnel endpoint).
    pub destination: Ipv4Addr,
    /// Outer type of service, DSCP and ECN, written as is.
    pub tos: u8,
    /// Outer time to live.
    pub ttl: u8,
    /// Set the "don't fragment" bit.
    pub dont_fragment: bool,
    /// UDP source port (flow entropy).
    pub src_port: u16,
    /// UDP destination port (the tunnel port).
    pub dst_port: u16,
    /// VXLAN network identifier.
    pub vni: Vni,
}

/// Errors which may occur when encapsulating a frame with VXLAN headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VxlanEncapError {
    /// The encapsulated datagram would not fit in an IPv4 total length field.
    #[error("encapsulated frame of {0} bytes exceeds the IPv4 maximum")]
    FrameTooLarge(usize),
    /// The tunnel id does not fit in a VNI.
    #[error(transparent)]
    InvalidVni(#[from] InvalidVni),
}

impl VxlanEncap {
    /// Bytes added in front of the inner frame (IPv4 without options, UDP, VXLAN).
    pub const OVERHEAD: usize = Ipv4Header::MIN_LEN + UDP_HEADER_LEN + Vxlan::MIN_LENGTH.get();

    /// Build the complete underlay IPv4 datagram carrying `inner`.
    ///
    /// # Errors
    ///
    /// Returns [`VxlanEncapError::FrameTooLarge`] if the result would exceed 65535 bytes.
    pub fn encapsulate(&self, inner: &[u8]) -> Result<BytesMut, VxlanEncapError> {
        let total = Self::OVERHEAD + inner.len();
        if u16::try_from(total).is_err() {
            return Err(VxlanEncapError::FrameTooLarge(total));
        }
        let udp_len = total - Ipv4Header::MIN_LEN;
        #[allow(clippy::cast_possible_truncation)] // bounded by the check above
        let udp_len = udp_len as u16;

        let mut ip = Ipv4Header::new(
            udp_len,
            self.ttl,
            IpNumber::UDP,
            self.source.octets(),
            self.destination.octets(),
        )
        .map_err(|_| VxlanEncapError::FrameTooLarge(total))?;
        ip.dscp = IpDscp::try_new(self.tos >> 2).unwrap_or_else(|_| unreachable!());
        ip.ecn = IpEcn::try_new(self.tos & ECN_MASK).unwrap_or_else(|_| unreachable!());
        ip.dont_fragment = self.dont_fragment;
        ip.header_checksum = ip.calc_header_checksum();

        let udp = UdpHeader {
            source_port: self.src_port,
            destination_port: self.dst_port,
            length: udp_len,
            checksum: 0,
        };

        let mut vxlan = [0u8; Vxlan::MIN_LENGTH.get()];
        Vxlan::new(self.vni)
            .deparse(&mut vxlan)
            .unwrap_or_else(|e| unreachable!("{e:?}"));

        let mut out = BytesMut::with_capacity(total);
        out.put_slice(&ip.to_bytes());
        out.put_slice(&udp.to_bytes());
        out.put_slice(&vxlan);
        out.put_slice(inner);
        Ok(out)
    }
}
