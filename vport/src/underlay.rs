// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Collaborators of the vport: routing, underlay sockets and the forwarding pipeline.

use crate::errors::{RouteError, SocketError, TransmitError};
use crate::vport::VxlanVport;
use bytes::Bytes;
use etherparse::IpNumber;
use net::tunnel::TunnelKey;
use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Handler for datagrams received on an underlay socket.
///
/// Called from the receive path, possibly from several threads at once. Implementations must
/// not block.
pub trait ReceiveHandler: Send + Sync {
    /// Process one underlay IPv4 datagram, starting at the IPv4 header.
    fn receive(&self, datagram: Bytes);
}

/// An open underlay UDP socket.
pub trait UnderlaySocket: Send + Sync {
    /// The UDP port the socket is bound to.
    fn local_port(&self) -> u16;

    /// Unregister the receive handler and close the socket.
    fn close(self: Box<Self>);
}

/// A resolved route to an underlay destination.
///
/// Holding a route keeps it referenced; dropping it releases the reference.
pub trait Route: Send + Debug {
    /// Source address to use towards the destination.
    fn source(&self) -> Ipv4Addr;

    /// MTU of the egress path.
    fn mtu(&self) -> u16;
}

/// Parameters of a route lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteQuery {
    /// Preferred source address. May be unspecified.
    pub src_hint: Ipv4Addr,
    /// Destination address.
    pub dst: Ipv4Addr,
    /// Transport protocol of the packet to route.
    pub proto: IpNumber,
    /// Type of service.
    pub tos: u8,
    /// Packet mark.
    pub mark: u32,
}

/// Resolves underlay routes.
pub trait RouteResolver: Send + Sync {
    /// Look up a route. Must complete in bounded time.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if no route could be resolved.
    fn resolve(&self, query: &RouteQuery) -> Result<Box<dyn Route>, RouteError>;
}

/// A datagram the underlay refused to send, returned with the route it was given.
#[derive(Debug)]
pub struct Unsent {
    /// The route, still referenced. The caller releases it.
    pub route: Box<dyn Route>,
    /// Why the datagram was not sent.
    pub error: TransmitError,
}

/// The underlay network: UDP sockets and IPv4 egress.
pub trait Underlay: Send + Sync {
    /// Open a UDP socket on `port`, delivering received datagrams to `handler`.
    ///
    /// # Errors
    ///
    /// Returns a [`SocketError`] if the socket could not be opened.
    fn open(
        &self,
        port: u16,
        handler: Arc<dyn ReceiveHandler>,
    ) -> Result<Box<dyn UnderlaySocket>, SocketError>;

    /// Transmit an IPv4 datagram along `route`. On success the route is owned by the egress.
    ///
    /// # Errors
    ///
    /// Returns the route back in an [`Unsent`] if the datagram was not sent.
    fn transmit(&self, route: Box<dyn Route>, datagram: Bytes) -> Result<(), Unsent>;
}

/// The forwarding pipeline receiving decapsulated frames.
pub trait Pipeline: Send + Sync {
    /// Process an inner Ethernet frame received on `vport`. Must not block.
    fn deliver(&self, vport: &Arc<VxlanVport>, frame: Bytes, key: TunnelKey);
}
