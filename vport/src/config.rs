// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Vport and datapath configuration.

use crate::errors::ConfigError;
use derive_builder::Builder;
use net::udp::LocalPortRange;
use ordermap::OrderMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Attribute types understood in [`TunnelOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TunnelAttr {
    /// Destination UDP port, a host order `u16`.
    DstPort = 1,
}

impl From<TunnelAttr> for u16 {
    fn from(attr: TunnelAttr) -> u16 {
        attr as u16
    }
}

/// Typed attributes supplied when creating a tunnel vport.
///
/// Attributes are kept in insertion order, the way they appear in a netlink attribute nest.
/// Setting an attribute twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelOptions {
    attrs: OrderMap<u16, Vec<u8>>,
}

impl TunnelOptions {
    /// An empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set attribute `attr_type` to a raw payload.
    #[must_use]
    pub fn with_attr(mut self, attr_type: u16, payload: impl Into<Vec<u8>>) -> Self {
        self.attrs.insert(attr_type, payload.into());
        self
    }

    /// Set a `u16` valued attribute.
    #[must_use]
    pub fn with_u16(self, attr: TunnelAttr, value: u16) -> Self {
        self.with_attr(attr.into(), value.to_ne_bytes())
    }

    /// Raw payload of attribute `attr_type`.
    #[must_use]
    pub fn get(&self, attr_type: u16) -> Option<&[u8]> {
        self.attrs.get(&attr_type).map(Vec::as_slice)
    }

    /// Iterate over the attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.attrs.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Validated configuration of a VXLAN vport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Underlay UDP port the vport listens on and sends to.
    pub dst_port: u16,
}

impl TunnelConfig {
    /// Validate tunnel options.
    ///
    /// Attributes other than [`TunnelAttr::DstPort`] are ignored.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::NoOptions`] if `options` is `None`.
    /// * [`ConfigError::MissingPort`] if the destination port is absent or not exactly two bytes.
    pub fn parse(options: Option<&TunnelOptions>) -> Result<TunnelConfig, ConfigError> {
        let options = options.ok_or(ConfigError::NoOptions)?;
        for (attr_type, payload) in options.iter() {
            if attr_type != u16::from(TunnelAttr::DstPort) {
                trace!("ignoring tunnel attribute {attr_type} ({} bytes)", payload.len());
            }
        }
        let payload = options
            .get(TunnelAttr::DstPort.into())
            .ok_or(ConfigError::MissingPort)?;
        let port: [u8; 2] = payload.try_into().map_err(|_| ConfigError::MissingPort)?;
        Ok(TunnelConfig {
            dst_port: u16::from_ne_bytes(port),
        })
    }
}

impl From<TunnelConfig> for TunnelOptions {
    fn from(config: TunnelConfig) -> Self {
        TunnelOptions::new().with_u16(TunnelAttr::DstPort, config.dst_port)
    }
}

/// Datapath wide settings.
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatapathConfig {
    /// Name of the datapath, used in log lines.
    #[builder(setter(into), default = "dp0".to_string())]
    pub name: String,

    /// Ephemeral range for underlay UDP source ports.
    #[builder(default)]
    pub local_port_range: LocalPortRange,
}

impl Default for DatapathConfig {
    fn default() -> Self {
        Self {
            name: "dp0".to_string(),
            local_port_range: LocalPortRange::DEFAULT,
        }
    }
}

impl DatapathConfigBuilder {
    /// Set the local port range from its bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPortRange`] if `min` is zero or greater than `max`.
    pub fn port_range(&mut self, min: u16, max: u16) -> Result<&mut Self, ConfigError> {
        let range = LocalPortRange::new(min, max)?;
        Ok(self.local_port_range(range))
    }
}
