// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Shared, reference counted underlay sockets.
//!
//! Every vport listens on an underlay UDP port. Vports using the same port share one socket:
//! the first vport to [`SocketRegistry::acquire`] a port opens it, the last one to
//! [`SocketRegistry::release`] it closes it.
//!
//! Datagrams received on a socket are handed to the socket's dispatcher, which forwards them to
//! a vport bound to it. The set of bound vports is read without locking from the receive path
//! and replaced as a whole by the (rare) bind and unbind operations.

use crate::decap;
use crate::errors::SocketError;
use crate::sync::Mutex;
use crate::underlay::{Pipeline, ReceiveHandler, Underlay, UnderlaySocket};
use crate::vport::VxlanVport;
use ahash::RandomState;
use arc_swap::ArcSwap;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use tracing::{debug, error, info, trace};

/// Receive side of a shared socket.
pub(crate) struct RxDispatch {
    port: u16,
    bound: ArcSwap<Vec<Weak<VxlanVport>>>,
    pipeline: Arc<dyn Pipeline>,
    unbound_drops: AtomicU64,
}

impl RxDispatch {
    fn new(port: u16, pipeline: Arc<dyn Pipeline>) -> RxDispatch {
        RxDispatch {
            port,
            bound: ArcSwap::from_pointee(Vec::new()),
            pipeline,
            unbound_drops: AtomicU64::new(0),
        }
    }

    /// The vport packets are currently delivered to: the oldest bound one which is active.
    fn target(&self) -> Option<Arc<VxlanVport>> {
        self.bound
            .load()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|vport| vport.is_active())
    }
}

impl ReceiveHandler for RxDispatch {
    fn receive(&self, datagram: Bytes) {
        match self.target() {
            Some(vport) => decap::on_receive(&vport, self.pipeline.as_ref(), datagram),
            None => {
                self.unbound_drops.fetch_add(1, Ordering::Relaxed);
                trace!(
                    "udp port {}: no active vport, dropping {} bytes",
                    self.port,
                    datagram.len()
                );
            }
        }
    }
}

/// A reference to a shared underlay socket, held by each vport bound to it.
#[derive(Clone)]
pub struct SharedSocket {
    port: u16,
    local_port: u16,
    dispatch: Arc<RxDispatch>,
}

impl SharedSocket {
    /// The port the socket was requested for.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The port the socket is bound to.
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Datagrams dropped because no active vport was bound to the socket.
    #[must_use]
    pub fn unbound_drops(&self) -> u64 {
        self.dispatch.unbound_drops.load(Ordering::Relaxed)
    }

    pub(crate) fn bind(&self, vport: &Arc<VxlanVport>) {
        self.dispatch.bound.rcu(|bound| {
            let mut bound: Vec<_> = bound
                .iter()
                .filter(|weak| weak.strong_count() > 0)
                .cloned()
                .collect();
            bound.push(Arc::downgrade(vport));
            bound
        });
    }

    pub(crate) fn unbind(&self, vport: &VxlanVport) {
        self.dispatch.bound.rcu(|bound| {
            bound
                .iter()
                .filter(|weak| weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), vport))
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

impl Debug for SharedSocket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSocket")
            .field("port", &self.port)
            .field("local_port", &self.local_port)
            .field("bound", &self.dispatch.bound.load().len())
            .finish()
    }
}

struct SocketEntry {
    socket: Box<dyn UnderlaySocket>,
    shared: SharedSocket,
    refcount: usize,
}

type SocketMap = HashMap<u16, SocketEntry, RandomState>;

/// Owner of the shared underlay sockets, keyed by UDP port.
pub struct SocketRegistry {
    underlay: Arc<dyn Underlay>,
    pipeline: Arc<dyn Pipeline>,
    sockets: Mutex<SocketMap>,
}

impl SocketRegistry {
    /// Build an empty registry opening sockets on `underlay` and delivering to `pipeline`.
    #[must_use]
    pub fn new(underlay: Arc<dyn Underlay>, pipeline: Arc<dyn Pipeline>) -> SocketRegistry {
        SocketRegistry {
            underlay,
            pipeline,
            sockets: Mutex::new(HashMap::with_hasher(RandomState::with_seeds(0, 0, 0, 0))),
        }
    }

    fn with_sockets<T>(&self, f: impl FnOnce(&mut SocketMap) -> T) -> T {
        // entries are only modified once the fallible steps have succeeded
        let mut sockets = self.sockets.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut sockets)
    }

    /// Get a reference to the socket on `port`, opening it if this is the first one.
    ///
    /// Sockets are keyed by the port they are bound to. Port 0 always opens a new socket on an
    /// ephemeral port, which later requests for that port share.
    ///
    /// # Errors
    ///
    /// Returns a [`SocketError`] if the socket had to be opened and could not be. The registry
    /// is left unchanged in that case.
    pub fn acquire(&self, port: u16) -> Result<SharedSocket, SocketError> {
        self.with_sockets(|sockets| {
            if let Some(entry) = sockets.get_mut(&port).filter(|_| port != 0) {
                entry.refcount += 1;
                debug!("udp port {port}: socket shared by {} vports", entry.refcount);
                return Ok(entry.shared.clone());
            }
            let dispatch = Arc::new(RxDispatch::new(port, self.pipeline.clone()));
            let socket = self.underlay.open(port, dispatch.clone())?;
            let local_port = socket.local_port();
            if sockets.contains_key(&local_port) {
                socket.close();
                error!("udp port {local_port}: underlay bound a port which is already open");
                return Err(SocketError::Open {
                    port,
                    source: io::Error::from(io::ErrorKind::AddrInUse),
                });
            }
            let shared = SharedSocket {
                port,
                local_port,
                dispatch,
            };
            info!("udp port {local_port}: opened underlay socket");
            sockets.insert(
                local_port,
                SocketEntry {
                    socket,
                    shared: shared.clone(),
                    refcount: 1,
                },
            );
            Ok(shared)
        })
    }

    /// Drop a reference obtained from [`SocketRegistry::acquire`], closing the socket with the
    /// last one.
    pub fn release(&self, socket: &SharedSocket) {
        let port = socket.local_port;
        self.with_sockets(|sockets| {
            let Some(entry) = sockets.get_mut(&port) else {
                error!("udp port {port}: release of a socket which is not registered");
                return;
            };
            if !Arc::ptr_eq(&entry.shared.dispatch, &socket.dispatch) {
                error!("udp port {port}: release of a stale socket reference");
                return;
            }
            entry.refcount -= 1;
            if entry.refcount > 0 {
                debug!("udp port {port}: socket still used by {} vports", entry.refcount);
                return;
            }
            if let Some(entry) = sockets.remove(&port) {
                entry.socket.close();
                info!("udp port {port}: closed underlay socket");
            }
        });
    }

    /// Number of vports using the socket bound to `port`. Zero if there is no such socket.
    #[must_use]
    pub fn refcount(&self, port: u16) -> usize {
        self.with_sockets(|sockets| sockets.get(&port).map_or(0, |entry| entry.refcount))
    }

    /// Number of open sockets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_sockets(|sockets| sockets.len())
    }

    /// True if no socket is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
