// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Overlay packet as seen by the tunnel port.

use crate::tunnel::TunnelKey;
use bytes::BytesMut;

/// An overlay (inner) Ethernet frame along with the metadata a tunnel port needs to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    frame: BytesMut,
    tunnel: Option<TunnelKey>,
    mark: u32,
}

impl Packet {
    /// Wrap an inner Ethernet frame. The packet carries no [`TunnelKey`] yet.
    #[must_use]
    pub fn new(frame: impl Into<BytesMut>) -> Self {
        Self {
            frame: frame.into(),
            tunnel: None,
            mark: 0,
        }
    }

    /// Attach a [`TunnelKey`], replacing any previous one.
    #[must_use]
    pub fn with_tunnel_key(mut self, key: TunnelKey) -> Self {
        self.tunnel = Some(key);
        self
    }

    /// Set the packet mark used as a routing hint.
    #[must_use]
    pub fn with_mark(mut self, mark: u32) -> Self {
        self.mark = mark;
        self
    }

    /// The attached [`TunnelKey`], if any.
    #[must_use]
    pub fn tunnel_key(&self) -> Option<&TunnelKey> {
        self.tunnel.as_ref()
    }

    /// The packet mark.
    #[must_use]
    pub fn mark(&self) -> u32 {
        self.mark
    }

    /// The inner Ethernet frame.
    #[must_use]
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Consume the packet, returning the inner frame.
    #[must_use]
    pub fn into_frame(self) -> BytesMut {
        self.frame
    }
}
