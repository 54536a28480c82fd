// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-vport packet counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Packet counters of a vport. Updated from the packet paths without locking.
#[derive(Debug, Default)]
pub struct VportStats {
    rx_packets: AtomicU64,
    rx_dropped: AtomicU64,
    tx_packets: AtomicU64,
    tx_dropped: AtomicU64,
    tx_errors: AtomicU64,
}

/// A point in time copy of [`VportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VportStatsSnapshot {
    /// Packets decapsulated and delivered to the pipeline.
    pub rx_packets: u64,
    /// Underlay packets dropped because they could not be decapsulated.
    pub rx_dropped: u64,
    /// Packets handed to the underlay.
    pub tx_packets: u64,
    /// Packets dropped before transmission (no key, no route, encapsulation failure).
    pub tx_dropped: u64,
    /// Packets refused by the underlay.
    pub tx_errors: u64,
}

impl VportStats {
    pub(crate) fn rx_packet(&self) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rx_drop(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tx_packet(&self) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tx_drop(&self) {
        self.tx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tx_error(&self) {
        self.tx_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    ///
    /// Counters are read one by one; the snapshot is not atomic as a whole.
    #[must_use]
    pub fn snapshot(&self) -> VportStatsSnapshot {
        VportStatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
        }
    }
}
