// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The VXLAN vport object and its lifecycle state.

use crate::config::TunnelConfig;
use crate::registry::SharedSocket;
use crate::stats::VportStats;
use arrayvec::ArrayString;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, warn};

/// Size of an interface name buffer, including the terminating nul.
pub const IFNAMSIZ: usize = 16;

/// A vport name, at most [`IFNAMSIZ`] - 1 bytes.
pub type VportName = ArrayString<{ IFNAMSIZ - 1 }>;

/// Kind of a vport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum VportType {
    /// A VXLAN tunnel port.
    Vxlan,
}

/// Lifecycle state of a [`VxlanVport`].
///
/// A vport is `Creating` until bound to its socket, `Active` while it may send and receive,
/// and `Destroying` once destruction has started. There is no way back from `Destroying`; the
/// object is freed when the last reference to it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[repr(u8)]
pub enum VportState {
    /// Being bound to its underlay socket.
    Creating = 0,
    /// Sending and receiving.
    Active = 1,
    /// Unbound or being unbound. Waiting for in-flight packets to let go.
    Destroying = 2,
}

impl VportState {
    const fn from_u8(value: u8) -> VportState {
        match value {
            0 => VportState::Creating,
            1 => VportState::Active,
            _ => VportState::Destroying,
        }
    }
}

/// Truncate `name` to fit a [`VportName`], never splitting a character.
#[must_use]
pub fn truncate_name(name: &str) -> VportName {
    let mut out = VportName::new();
    for c in name.chars() {
        if out.try_push(c).is_err() {
            break;
        }
    }
    out
}

/// A VXLAN tunnel endpoint bound to an underlay UDP port.
///
/// Vports are created and destroyed by a [`Datapath`](crate::Datapath) and handed out as
/// `Arc<VxlanVport>`. The packet paths hold their own reference while they work on a vport, so
/// a vport destroyed concurrently stays valid until they are done.
#[derive(Debug)]
pub struct VxlanVport {
    name: VportName,
    socket: SharedSocket,
    state: AtomicU8,
    stats: VportStats,
}

impl VxlanVport {
    pub(crate) fn new(name: &str, socket: SharedSocket) -> VxlanVport {
        VxlanVport {
            name: truncate_name(name),
            socket,
            state: AtomicU8::new(VportState::Creating as u8),
            stats: VportStats::default(),
        }
    }

    /// The vport name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The configuration of the vport, as it can be dumped back.
    ///
    /// The port is the one the underlay socket is actually bound to.
    #[must_use]
    pub fn options(&self) -> TunnelConfig {
        TunnelConfig {
            dst_port: self.socket.local_port(),
        }
    }

    /// The underlay UDP port of the vport.
    #[must_use]
    pub fn dst_port(&self) -> u16 {
        self.socket.local_port()
    }

    /// Always [`VportType::Vxlan`].
    #[must_use]
    pub fn vport_type(&self) -> VportType {
        VportType::Vxlan
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> VportState {
        VportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True if the vport may send and receive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == VportState::Active
    }

    /// Packet counters.
    #[must_use]
    pub fn stats(&self) -> &VportStats {
        &self.stats
    }

    pub(crate) fn socket(&self) -> &SharedSocket {
        &self.socket
    }

    fn transition(&self, from: VportState, to: VportState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn activate(&self) -> bool {
        self.transition(VportState::Creating, VportState::Active)
    }

    /// Start destruction. Only the first caller wins.
    pub(crate) fn begin_destroy(&self) -> bool {
        self.transition(VportState::Active, VportState::Destroying)
    }
}

impl Display for VxlanVport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, udp port {}, {})",
            self.name,
            self.vport_type(),
            self.dst_port(),
            self.state()
        )
    }
}

impl Drop for VxlanVport {
    fn drop(&mut self) {
        if self.state() == VportState::Active {
            warn!("{}: freed while still active", self.name);
        }
        debug!("{}: freed", self.name);
    }
}
