// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transmit path: overlay packet to underlay datagram.

use crate::errors::{EncapError, SendError};
use crate::underlay::{RouteQuery, RouteResolver, Underlay, Unsent};
use crate::vport::VxlanVport;
use etherparse::IpNumber;
use net::flow_hash::select_source_port;
use net::packet::Packet;
use net::udp::LocalPortRange;
use net::vxlan::{Vni, VxlanEncap, VxlanEncapError};
use tracing::{debug, trace};

/// What the transmit path needs besides the vport and the packet.
pub(crate) struct Egress<'a> {
    pub(crate) routes: &'a dyn RouteResolver,
    pub(crate) underlay: &'a dyn Underlay,
    pub(crate) port_range: LocalPortRange,
}

impl Egress<'_> {
    /// Encapsulate and transmit `packet` on `vport`, updating its counters.
    pub(crate) fn send(&self, vport: &VxlanVport, packet: &Packet) -> Result<(), SendError> {
        let result = self.transmit(vport, packet);
        match &result {
            Ok(()) => vport.stats().tx_packet(),
            Err(SendError::Transmit(e)) => {
                vport.stats().tx_error();
                debug!("{}: transmit failed: {e}", vport.name());
            }
            Err(e) => {
                vport.stats().tx_drop();
                debug!("{}: dropping packet: {e}", vport.name());
            }
        }
        result
    }

    fn transmit(&self, vport: &VxlanVport, packet: &Packet) -> Result<(), SendError> {
        let Some(key) = packet.tunnel_key().copied() else {
            return Err(SendError::MissingTunnelKey);
        };
        if !vport.is_active() {
            return Err(SendError::Inactive);
        }

        let route = self.routes.resolve(&RouteQuery {
            src_hint: key.src_addr(),
            dst: key.dst_addr(),
            proto: IpNumber::UDP,
            tos: key.tos(),
            mark: packet.mark(),
        })?;

        // From here on, returning early drops (and so releases) the route.
        let vni = Vni::try_from(key.tunnel_id())
            .map_err(|e| EncapError::from(VxlanEncapError::from(e)))?;
        let encap = VxlanEncap {
            source: route.source(),
            destination: key.dst_addr(),
            tos: key.tos(),
            ttl: key.ttl(),
            dont_fragment: key.dont_fragment(),
            src_port: select_source_port(packet.frame(), &self.port_range),
            dst_port: vport.dst_port(),
            vni,
        };
        let datagram = encap.encapsulate(packet.frame()).map_err(EncapError::from)?;
        if datagram.len() > usize::from(route.mtu()) {
            return Err(EncapError::ExceedsMtu {
                len: datagram.len(),
                mtu: route.mtu(),
            }
            .into());
        }

        trace!(
            "{}: sending {} bytes {} -> {} udp {} -> {} vni {}",
            vport.name(),
            datagram.len(),
            encap.source,
            encap.destination,
            encap.src_port,
            encap.dst_port,
            encap.vni
        );
        self.underlay
            .transmit(route, datagram.freeze())
            .map_err(|Unsent { route, error }| {
                drop(route);
                SendError::Transmit(error)
            })
    }
}
