// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Receive path: underlay datagram to inner frame plus tunnel key.

use crate::underlay::Pipeline;
use crate::vport::VxlanVport;
use bytes::Bytes;
use net::tunnel::{TunnelFlags, TunnelKey};
use net::vxlan::VxlanDecap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decapsulate an underlay IPv4 datagram received for `vport` and deliver the inner frame.
///
/// The frame handed to `pipeline` shares the buffer of `datagram`. Datagrams which are not
/// well formed VXLAN are dropped and counted; this never blocks and never fails.
pub fn on_receive(vport: &Arc<VxlanVport>, pipeline: &dyn Pipeline, mut datagram: Bytes) {
    let decap = match VxlanDecap::parse(&datagram) {
        Ok(decap) => decap,
        Err(e) => {
            vport.stats().rx_drop();
            debug!("{}: dropping underlay packet: {e}", vport.name());
            return;
        }
    };
    let key = TunnelKey::new(
        decap.outer.source,
        decap.outer.destination,
        u64::from(decap.vxlan.vni()),
        decap.outer.tos,
        decap.outer.ttl,
        TunnelFlags::KEY,
    );
    datagram.truncate(decap.inner_end);
    let frame = datagram.split_off(decap.inner_offset);
    trace!("{}: received {} bytes, {key}", vport.name(), frame.len());
    vport.stats().rx_packet();
    pipeline.deliver(vport, frame, key);
}
