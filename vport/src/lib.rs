// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::module_name_repetitions)]

//! VXLAN tunnel ports.
//!
//! A [`Datapath`] creates named [`VxlanVport`]s, each bound to an underlay UDP port. Vports on
//! the same UDP port share a single underlay socket, owned by the [`SocketRegistry`] and
//! reference counted by the vports using it.
//!
//! Packets handed to [`Datapath::send`] are wrapped in IPv4 / UDP / VXLAN headers and
//! transmitted over the [`Underlay`]; datagrams received from the underlay are stripped of
//! their outer headers and delivered to the [`Pipeline`] along with a [`TunnelKey`] describing
//! the underlay addressing they arrived with.
//!
//! Routing, the actual sockets and the forwarding pipeline are collaborators, see
//! [`underlay`].
//!
//! [`SocketRegistry`]: registry::SocketRegistry
//! [`Underlay`]: underlay::Underlay
//! [`Pipeline`]: underlay::Pipeline
//! [`TunnelKey`]: net::tunnel::TunnelKey

pub mod config;
pub mod datapath;
pub mod decap;
pub mod encap;
pub mod errors;
pub mod registry;
pub mod stats;
mod sync;
pub mod underlay;
pub mod vport;

#[cfg(test)]
mod test_utils;

pub use config::{DatapathConfig, DatapathConfigBuilder, TunnelConfig, TunnelOptions};
pub use datapath::Datapath;
pub use errors::{ConfigError, SendError, SocketError, VportError};
pub use vport::{VportState, VportType, VxlanVport};
