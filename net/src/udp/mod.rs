// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP related types used by the underlay.

mod port_range;

pub use port_range::{InvalidPortRange, LocalPortRange};

/// Length of a UDP header.
pub const UDP_HEADER_LEN: usize = 8;
