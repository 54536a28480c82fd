// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow hashing of inner frames, used to pick the underlay UDP source port.
//!
//! Underlay routers balance VXLAN traffic over equal cost paths using the outer UDP source port
//! as entropy. Every packet of an inner flow must produce the same port (so that the flow is not
//! reordered over several paths), while distinct flows should use the whole ephemeral range.

use crate::udp::LocalPortRange;
use ahash::RandomState;
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::OnceLock;

/// Length of an untagged Ethernet header.
const ETH_HEADER_LEN: usize = 14;

fn hasher_state() -> &'static RandomState {
    static HASHER_STATE: OnceLock<RandomState> = OnceLock::new();
    HASHER_STATE.get_or_init(|| RandomState::with_seeds(0, 0, 0, 0))
}

/// Feed the flow identifiers of an inner Ethernet frame into `state`.
///
/// For IP frames these are the addresses, the transport protocol and, for TCP and UDP, the
/// ports. Anything else (ARP, non-IP ethertypes, frames which do not parse) is hashed over its
/// Ethernet header only, so that at least MAC conversations keep their affinity.
pub fn hash_flow<H: Hasher>(frame: &[u8], state: &mut H) {
    let Ok(sliced) = SlicedPacket::from_ethernet(frame) else {
        hash_eth_header(frame, state);
        return;
    };
    match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            header.source_addr().hash(state);
            header.destination_addr().hash(state);
            header.protocol().0.hash(state);
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            header.source_addr().hash(state);
            header.destination_addr().hash(state);
            header.next_header().0.hash(state);
        }
        _ => {
            hash_eth_header(frame, state);
            return;
        }
    }
    match &sliced.transport {
        Some(TransportSlice::Udp(udp)) => {
            udp.source_port().hash(state);
            udp.destination_port().hash(state);
        }
        Some(TransportSlice::Tcp(tcp)) => {
            tcp.source_port().hash(state);
            tcp.destination_port().hash(state);
        }
        _ => {}
    }
}

fn hash_eth_header<H: Hasher>(frame: &[u8], state: &mut H) {
    let len = frame.len().min(ETH_HEADER_LEN);
    frame[..len].hash(state);
}

/// Compute the flow hash of an inner Ethernet frame.
#[must_use]
pub fn flow_hash(frame: &[u8]) -> u64 {
    let mut hasher = hasher_state().build_hasher();
    hash_flow(frame, &mut hasher);
    hasher.finish()
}

/// Select the underlay UDP source port for an inner frame.
#[must_use]
pub fn select_source_port(frame: &[u8], range: &LocalPortRange) -> u16 {
    let hash = flow_hash(frame);
    // fold so that both halves of the 64-bit hash contribute
    #[allow(clippy::cast_possible_truncation)]
    let folded = (hash ^ (hash >> 32)) as u32;
    range.pick(folded)
}
