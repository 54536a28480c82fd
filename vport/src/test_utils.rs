// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory collaborators for tests.

#![allow(clippy::unwrap_used, clippy::panic, dead_code)]

use crate::config::{DatapathConfig, TunnelAttr, TunnelOptions};
use crate::datapath::Datapath;
use crate::errors::{RouteError, SocketError, TransmitError};
use crate::underlay::{
    Pipeline, ReceiveHandler, Route, RouteQuery, RouteResolver, Underlay, UnderlaySocket, Unsent,
};
use crate::vport::VxlanVport;
use bytes::Bytes;
use etherparse::PacketBuilder;
use net::tunnel::TunnelKey;
use net::vxlan::{Vni, Vxlan, VxlanEncap};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Handlers = Arc<Mutex<HashMap<u16, Arc<dyn ReceiveHandler>>>>;

/// Underlay keeping its sockets in a map and its sent datagrams in a list.
#[derive(Default)]
pub(crate) struct MockUnderlay {
    handlers: Handlers,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    fail_open: AtomicBool,
    remap: Mutex<HashMap<u16, u16>>,
    fail_transmit: Mutex<Option<fn() -> TransmitError>>,
    transmit_calls: AtomicUsize,
    transmitted: Mutex<Vec<Bytes>>,
    in_flight: Mutex<Vec<Box<dyn Route>>>,
}

struct MockSocket {
    port: u16,
    local_port: u16,
    handlers: Handlers,
    closes: Arc<AtomicUsize>,
}

impl UnderlaySocket for MockSocket {
    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn close(self: Box<Self>) {
        let removed = self.handlers.lock().unwrap().remove(&self.port);
        assert!(removed.is_some(), "udp port {} closed twice", self.port);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl MockUnderlay {
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn is_open(&self, port: u16) -> bool {
        self.handlers.lock().unwrap().contains_key(&port)
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Bind sockets requested on `requested` to `actual`, like an ephemeral bind. Sockets are
    /// keyed by the port they are bound to.
    pub(crate) fn remap_port(&self, requested: u16, actual: u16) {
        self.remap.lock().unwrap().insert(requested, actual);
    }

    pub(crate) fn fail_transmit(&self, error: Option<fn() -> TransmitError>) {
        *self.fail_transmit.lock().unwrap() = error;
    }

    pub(crate) fn transmit_calls(&self) -> usize {
        self.transmit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn take_transmitted(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.transmitted.lock().unwrap())
    }

    /// Deliver `datagram` as if received on `port`. Returns false if no socket is open there.
    pub(crate) fn inject(&self, port: u16, datagram: Bytes) -> bool {
        let handler = self.handlers.lock().unwrap().get(&port).cloned();
        match handler {
            Some(handler) => {
                handler.receive(datagram);
                true
            }
            None => false,
        }
    }
}

impl Underlay for MockUnderlay {
    fn open(
        &self,
        port: u16,
        handler: Arc<dyn ReceiveHandler>,
    ) -> Result<Box<dyn UnderlaySocket>, SocketError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SocketError::Open {
                port,
                source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
            });
        }
        let local_port = self.remap.lock().unwrap().get(&port).copied().unwrap_or(port);
        let previous = self.handlers.lock().unwrap().insert(local_port, handler);
        assert!(previous.is_none(), "udp port {local_port} bound twice");
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSocket {
            port: local_port,
            local_port,
            handlers: self.handlers.clone(),
            closes: self.closes.clone(),
        }))
    }

    fn transmit(&self, route: Box<dyn Route>, datagram: Bytes) -> Result<(), Unsent> {
        self.transmit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = *self.fail_transmit.lock().unwrap() {
            return Err(Unsent {
                route,
                error: error(),
            });
        }
        self.transmitted.lock().unwrap().push(datagram);
        self.in_flight.lock().unwrap().push(route);
        Ok(())
    }
}

#[derive(Debug)]
struct MockRoute {
    source: Ipv4Addr,
    mtu: u16,
    released: Arc<AtomicUsize>,
}

impl Route for MockRoute {
    fn source(&self) -> Ipv4Addr {
        self.source
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }
}

impl Drop for MockRoute {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolver answering every query with the same route.
pub(crate) struct MockResolver {
    source: Ipv4Addr,
    mtu: AtomicU16,
    fail: Mutex<Option<RouteError>>,
    queries: Mutex<Vec<RouteQuery>>,
    issued: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self {
            source: Ipv4Addr::new(10, 0, 0, 1),
            mtu: AtomicU16::new(1500),
            fail: Mutex::new(None),
            queries: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockResolver {
    pub(crate) fn source(&self) -> Ipv4Addr {
        self.source
    }

    pub(crate) fn set_mtu(&self, mtu: u16) {
        self.mtu.store(mtu, Ordering::SeqCst);
    }

    pub(crate) fn fail_with(&self, error: Option<RouteError>) {
        *self.fail.lock().unwrap() = error;
    }

    pub(crate) fn lookups(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub(crate) fn last_query(&self) -> Option<RouteQuery> {
        self.queries.lock().unwrap().last().copied()
    }

    /// Routes handed out.
    pub(crate) fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Routes dropped.
    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl RouteResolver for MockResolver {
    fn resolve(&self, query: &RouteQuery) -> Result<Box<dyn Route>, RouteError> {
        self.queries.lock().unwrap().push(*query);
        if let Some(error) = *self.fail.lock().unwrap() {
            return Err(error);
        }
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRoute {
            source: self.source,
            mtu: self.mtu.load(Ordering::SeqCst),
            released: self.released.clone(),
        }))
    }
}

/// A frame delivered to [`CapturePipeline`].
#[derive(Debug, Clone)]
pub(crate) struct Delivery {
    pub(crate) vport: String,
    pub(crate) frame: Bytes,
    pub(crate) key: TunnelKey,
}

/// Pipeline recording what it is given.
#[derive(Default)]
pub(crate) struct CapturePipeline {
    delivered: Mutex<Vec<Delivery>>,
}

impl CapturePipeline {
    pub(crate) fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.delivered.lock().unwrap())
    }
}

impl Pipeline for CapturePipeline {
    fn deliver(&self, vport: &Arc<VxlanVport>, frame: Bytes, key: TunnelKey) {
        self.delivered.lock().unwrap().push(Delivery {
            vport: vport.name().to_string(),
            frame,
            key,
        });
    }
}

/// A datapath wired to mock collaborators.
pub(crate) struct Fixture {
    pub(crate) datapath: Datapath,
    pub(crate) underlay: Arc<MockUnderlay>,
    pub(crate) routes: Arc<MockResolver>,
    pub(crate) pipeline: Arc<CapturePipeline>,
}

impl Fixture {
    pub(crate) fn new() -> Fixture {
        let underlay = Arc::new(MockUnderlay::default());
        let routes = Arc::new(MockResolver::default());
        let pipeline = Arc::new(CapturePipeline::default());
        let datapath = Datapath::new(
            DatapathConfig::default(),
            underlay.clone(),
            routes.clone(),
            pipeline.clone(),
        );
        Fixture {
            datapath,
            underlay,
            routes,
            pipeline,
        }
    }

    pub(crate) fn create(&self, name: &str, port: u16) -> Arc<VxlanVport> {
        let options = TunnelOptions::new().with_u16(TunnelAttr::DstPort, port);
        self.datapath.create(name, Some(&options)).unwrap()
    }
}

/// An inner Ethernet / IPv4 / UDP frame.
pub(crate) fn inner_frame(sport: u16, dport: u16) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
        .udp(sport, dport);
    let payload = b"overlay payload";
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

/// An underlay datagram from 192.0.2.1 to 192.0.2.2 carrying `inner` on VNI `vni`.
pub(crate) fn encapsulated(vni: u32, tos: u8, ttl: u8, inner: &[u8]) -> Bytes {
    VxlanEncap {
        source: Ipv4Addr::new(192, 0, 2, 1),
        destination: Ipv4Addr::new(192, 0, 2, 2),
        tos,
        ttl,
        dont_fragment: false,
        src_port: 50000,
        dst_port: Vxlan::PORT,
        vni: Vni::new_checked(vni).unwrap(),
    }
    .encapsulate(inner)
    .unwrap()
    .freeze()
}
