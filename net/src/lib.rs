// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)] // Validation logic should always be strictly safe
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Wire level types for the VXLAN tunnel port.
//!
//! This crate knows how to build and take apart the underlay IPv4 / UDP / VXLAN headers that
//! wrap an overlay Ethernet frame, and defines the per-packet [`TunnelKey`] metadata which is
//! attached on receipt and consumed on transmission.
//!
//! [`TunnelKey`]: tunnel::TunnelKey

pub mod flow_hash;
pub mod packet;
pub mod parse;
pub mod tunnel;
pub mod udp;
pub mod vxlan;
