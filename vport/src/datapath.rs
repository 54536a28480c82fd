// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The datapath: owner of the socket registry and entry point for vport operations.

use crate::config::{DatapathConfig, TunnelConfig, TunnelOptions};
use crate::encap::Egress;
use crate::errors::{SendError, VportError};
use crate::registry::SocketRegistry;
use crate::underlay::{Pipeline, RouteResolver, Underlay};
use crate::vport::VxlanVport;
use net::packet::Packet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Creates, destroys and sends on VXLAN vports.
pub struct Datapath {
    config: DatapathConfig,
    registry: SocketRegistry,
    routes: Arc<dyn RouteResolver>,
    underlay: Arc<dyn Underlay>,
}

impl Datapath {
    /// Build a datapath with no vports.
    #[must_use]
    pub fn new(
        config: DatapathConfig,
        underlay: Arc<dyn Underlay>,
        routes: Arc<dyn RouteResolver>,
        pipeline: Arc<dyn Pipeline>,
    ) -> Datapath {
        info!(
            "{}: datapath up, underlay source ports {}",
            config.name, config.local_port_range
        );
        Datapath {
            registry: SocketRegistry::new(underlay.clone(), pipeline),
            config,
            routes,
            underlay,
        }
    }

    /// The datapath configuration.
    #[must_use]
    pub fn config(&self) -> &DatapathConfig {
        &self.config
    }

    /// The registry of underlay sockets.
    #[must_use]
    pub fn registry(&self) -> &SocketRegistry {
        &self.registry
    }

    /// Create a VXLAN vport named `name` with tunnel `options`.
    ///
    /// Names longer than 15 bytes are truncated. Creation is all or nothing: on error no
    /// socket reference is held and nothing is bound.
    ///
    /// # Errors
    ///
    /// * [`VportError::Config`] if the options are invalid. Nothing is allocated.
    /// * [`VportError::Socket`] if the underlay socket could not be opened.
    pub fn create(
        &self,
        name: &str,
        options: Option<&TunnelOptions>,
    ) -> Result<Arc<VxlanVport>, VportError> {
        let config = TunnelConfig::parse(options).inspect_err(|e| {
            debug!("{}: refusing vport {name}: {e}", self.config.name);
        })?;
        let socket = self.registry.acquire(config.dst_port).inspect_err(|e| {
            warn!("{}: refusing vport {name}: {e}", self.config.name);
        })?;
        let vport = Arc::new(VxlanVport::new(name, socket));
        vport.socket().bind(&vport);
        if !vport.activate() {
            error!("{}: vport {} was not in creating state", self.config.name, vport.name());
        }
        info!("{}: created vport {vport}", self.config.name);
        Ok(vport)
    }

    /// Destroy `vport`: unbind it from its socket and drop its socket reference.
    ///
    /// Packets already being processed keep the vport alive until they are done; it is freed
    /// with the last reference. Destroying a vport twice is a no-op.
    pub fn destroy(&self, vport: &VxlanVport) {
        if !vport.begin_destroy() {
            debug!(
                "{}: vport {} is already {}",
                self.config.name,
                vport.name(),
                vport.state()
            );
            return;
        }
        vport.socket().unbind(vport);
        self.registry.release(vport.socket());
        info!("{}: destroyed vport {}", self.config.name, vport.name());
    }

    /// Encapsulate `packet` according to its tunnel key and send it over the underlay.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the packet was not sent. The packet is dropped and counted
    /// against the vport; the vport stays usable.
    pub fn send(&self, vport: &VxlanVport, packet: &Packet) -> Result<(), SendError> {
        Egress {
            routes: self.routes.as_ref(),
            underlay: self.underlay.as_ref(),
            port_range: self.config.local_port_range,
        }
        .send(vport, packet)
    }
}

#[cfg(test)]
#[cfg(not(feature = "shuttle"))]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::config::TunnelAttr;
    use crate::errors::{ConfigError, SocketError};
    use crate::test_utils::{Fixture, encapsulated, inner_frame};
    use crate::vport::{VportState, VportType};
    use std::sync::Weak;
    use std::thread;
    use tracing_test::traced_test;

    fn port(port: u16) -> TunnelOptions {
        TunnelOptions::new().with_u16(TunnelAttr::DstPort, port)
    }

    #[test]
    #[traced_test]
    fn create_then_destroy_closes_the_socket() {
        let fixture = Fixture::new();
        let vport = fixture.datapath.create("vxlan0", Some(&port(4789))).unwrap();
        assert_eq!(vport.state(), VportState::Active);
        assert_eq!(vport.vport_type(), VportType::Vxlan);
        assert_eq!(vport.name(), "vxlan0");
        assert_eq!(vport.options(), TunnelConfig { dst_port: 4789 });
        assert_eq!(fixture.datapath.registry().refcount(4789), 1);
        assert!(fixture.underlay.is_open(4789));

        fixture.datapath.destroy(&vport);
        assert_eq!(vport.state(), VportState::Destroying);
        assert_eq!(fixture.datapath.registry().refcount(4789), 0);
        assert!(!fixture.underlay.is_open(4789));
        assert!(logs_contain("udp port 4789: opened underlay socket"));
        assert!(logs_contain("udp port 4789: closed underlay socket"));

        drop(vport);
        assert!(logs_contain("vxlan0: freed"));
    }

    #[test]
    fn vports_on_one_port_share_a_socket() {
        let fixture = Fixture::new();
        let a = fixture.datapath.create("vxlan-a", Some(&port(4789))).unwrap();
        let b = fixture.datapath.create("vxlan-b", Some(&port(4789))).unwrap();
        assert_eq!(fixture.underlay.opens(), 1);
        assert_eq!(fixture.datapath.registry().refcount(4789), 2);

        fixture.datapath.destroy(&a);
        assert_eq!(fixture.datapath.registry().refcount(4789), 1);
        assert!(fixture.underlay.is_open(4789));

        fixture.datapath.destroy(&b);
        assert_eq!(fixture.datapath.registry().refcount(4789), 0);
        assert!(!fixture.underlay.is_open(4789));
        assert_eq!(fixture.underlay.closes(), 1);
    }

    #[test]
    fn receive_goes_to_the_oldest_active_vport() {
        let fixture = Fixture::new();
        let a = fixture.create("vxlan-a", 4789);
        let b = fixture.create("vxlan-b", 4789);
        let datagram = encapsulated(1, 0, 64, &inner_frame(1, 2));

        assert!(fixture.underlay.inject(4789, datagram.clone()));
        fixture.datapath.destroy(&a);
        assert!(fixture.underlay.inject(4789, datagram.clone()));
        let delivered: Vec<_> = fixture
            .pipeline
            .take()
            .into_iter()
            .map(|d| d.vport)
            .collect();
        assert_eq!(delivered, ["vxlan-a", "vxlan-b"]);
        fixture.datapath.destroy(&b);
    }

    #[test]
    fn config_errors_allocate_nothing() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.datapath.create("vxlan0", None),
            Err(VportError::Config(ConfigError::NoOptions))
        ));
        assert!(matches!(
            fixture.datapath.create("vxlan0", Some(&TunnelOptions::new())),
            Err(VportError::Config(ConfigError::MissingPort))
        ));
        let short = TunnelOptions::new().with_attr(TunnelAttr::DstPort.into(), [0x12u8]);
        assert!(matches!(
            fixture.datapath.create("vxlan0", Some(&short)),
            Err(VportError::Config(ConfigError::MissingPort))
        ));
        assert_eq!(fixture.underlay.opens(), 0);
        assert!(fixture.datapath.registry().is_empty());
    }

    #[test]
    fn socket_errors_allocate_nothing() {
        let fixture = Fixture::new();
        let existing = fixture.create("vxlan-a", 4789);
        fixture.underlay.fail_open(true);
        assert!(matches!(
            fixture.datapath.create("vxlan-b", Some(&port(8472))),
            Err(VportError::Socket(SocketError::Open { port: 8472, .. }))
        ));
        assert_eq!(fixture.datapath.registry().len(), 1);
        assert_eq!(fixture.datapath.registry().refcount(8472), 0);
        // an already open port does not need the underlay
        let shared = fixture.datapath.create("vxlan-c", Some(&port(4789))).unwrap();
        assert_eq!(fixture.datapath.registry().refcount(4789), 2);
        fixture.datapath.destroy(&shared);
        fixture.datapath.destroy(&existing);
    }

    #[test]
    #[traced_test]
    fn second_destroy_is_a_no_op() {
        let fixture = Fixture::new();
        let a = fixture.create("vxlan-a", 4789);
        let b = fixture.create("vxlan-b", 4789);
        fixture.datapath.destroy(&a);
        fixture.datapath.destroy(&a);
        assert_eq!(fixture.datapath.registry().refcount(4789), 1);
        assert!(fixture.underlay.is_open(4789));
        assert!(logs_contain("vport vxlan-a is already"));
        fixture.datapath.destroy(&b);
    }

    #[test]
    fn long_names_are_truncated() {
        let fixture = Fixture::new();
        let vport = fixture.create("a-very-long-vxlan-port-name", 4789);
        assert_eq!(vport.name(), "a-very-long-vxl");
        fixture.datapath.destroy(&vport);
    }

    #[test]
    fn options_report_the_bound_port() {
        let fixture = Fixture::new();
        fixture.underlay.remap_port(0, 39000);
        let vport = fixture.create("vxlan0", 0);
        assert_eq!(vport.options(), TunnelConfig { dst_port: 39000 });
        assert_eq!(TunnelOptions::from(vport.options()), port(39000));

        // asking for the reported port shares the socket instead of binding it again
        let twin = fixture.create("vxlan1", 39000);
        assert_eq!(fixture.underlay.opens(), 1);
        assert_eq!(fixture.datapath.registry().refcount(39000), 2);
        fixture.datapath.destroy(&vport);
        assert!(fixture.underlay.is_open(39000));
        fixture.datapath.destroy(&twin);
        assert!(!fixture.underlay.is_open(39000));
    }

    #[test]
    fn destroyed_vport_outlives_in_flight_receive() {
        let fixture = Fixture::new();
        let vport = fixture.create("vxlan0", 4789);
        let weak: Weak<VxlanVport> = Arc::downgrade(&vport);
        // what the receive path holds while working on a packet
        let in_flight = weak.upgrade().unwrap();

        fixture.datapath.destroy(&vport);
        drop(vport);
        assert!(!fixture.underlay.is_open(4789));
        assert_eq!(in_flight.name(), "vxlan0");
        assert_eq!(in_flight.state(), VportState::Destroying);
        assert!(weak.upgrade().is_some());

        drop(in_flight);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn destroy_races_with_receive() {
        const ROUNDS: usize = 20;
        let fixture = Fixture::new();
        for _ in 0..ROUNDS {
            let vport = fixture.create("vxlan-race", 4789);
            let weak = Arc::downgrade(&vport);
            let underlay = fixture.underlay.clone();
            let receiver = thread::spawn(move || {
                let datagram = encapsulated(3, 0, 64, &inner_frame(7, 8));
                for _ in 0..200 {
                    if !underlay.inject(4789, datagram.clone()) {
                        break;
                    }
                }
            });
            fixture.datapath.destroy(&vport);
            drop(vport);
            receiver.join().unwrap();
            assert!(weak.upgrade().is_none());
            fixture.pipeline.take();
        }
        assert!(fixture.datapath.registry().is_empty());
        assert_eq!(fixture.underlay.opens(), ROUNDS);
        assert_eq!(fixture.underlay.closes(), ROUNDS);
    }
}
