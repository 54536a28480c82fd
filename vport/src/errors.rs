// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error types of the vport crate.

use net::udp::InvalidPortRange;
use net::vxlan::VxlanEncapError;
use std::net::Ipv4Addr;

/// Errors in tunnel or datapath configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No tunnel options were supplied at all.
    #[error("no tunnel options")]
    NoOptions,
    /// The destination port attribute is absent or not a 16-bit value.
    #[error("missing or malformed destination port option")]
    MissingPort,
    /// The local port range is unusable.
    #[error(transparent)]
    InvalidPortRange(#[from] InvalidPortRange),
}

/// Errors from the underlay socket layer.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The underlay socket could not be opened.
    #[error("failed to open underlay socket on udp port {port}: {source}")]
    Open {
        /// Requested UDP port.
        port: u16,
        /// Cause reported by the underlay.
        source: std::io::Error,
    },
}

/// Errors returned when creating a vport.
#[derive(Debug, thiserror::Error)]
pub enum VportError {
    /// The tunnel options are invalid. Nothing was allocated.
    #[error("bad vport configuration: {0}")]
    Config(#[from] ConfigError),
    /// The shared underlay socket could not be acquired. Nothing was allocated.
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// Errors from the route resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// There is no route to the destination.
    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),
    /// The lookup did not complete in bounded time.
    #[error("route lookup for {0} timed out")]
    Timeout(Ipv4Addr),
}

/// Errors from the underlay transmit path.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// The egress link is down.
    #[error("egress link is down")]
    LinkDown,
    /// The egress queue is full.
    #[error("egress queue is full")]
    QueueFull,
    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors building the underlay packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncapError {
    /// The headers could not be built.
    #[error(transparent)]
    Vxlan(#[from] VxlanEncapError),
    /// The encapsulated packet does not fit the route MTU. Fragmentation is not supported.
    #[error("encapsulated packet of {len} bytes exceeds route mtu {mtu}")]
    ExceedsMtu {
        /// Length of the encapsulated packet.
        len: usize,
        /// MTU of the route.
        mtu: u16,
    },
}

/// Errors returned by [`Datapath::send`](crate::Datapath::send).
///
/// All of them are per-packet: the packet is dropped and counted, the vport stays usable.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The packet carries no tunnel key.
    #[error("packet has no tunnel key")]
    MissingTunnelKey,
    /// The vport is being destroyed.
    #[error("vport is not active")]
    Inactive,
    /// Route resolution failed.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// The underlay packet could not be built.
    #[error(transparent)]
    Encapsulation(#[from] EncapError),
    /// The underlay refused the packet.
    #[error(transparent)]
    Transmit(#[from] TransmitError),
}
