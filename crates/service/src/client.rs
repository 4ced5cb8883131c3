//! The server's per-connection client record (§3 "Client (server-side
//! view)") and the table of all connected clients.

use std::{
    net::SocketAddr,
    ops::{Deref, DerefMut},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use ahash::{HashMap, HashMapExt};
use parking_lot::RwLock;

/// Pre-sized `HashMap` wrapper, mirroring the capacity-aware table used
/// elsewhere for connection-scale maps.
pub struct Table<K, V>(HashMap<K, V>);

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self(HashMap::with_capacity(256))
    }
}

impl<K, V> Deref for Table<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K, V> DerefMut for Table<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// One accepted TCP connection. `S` is whatever the caller uses to push
/// bytes back to this client (a channel to the per-connection writer task,
/// in `vsoa-server`); this crate never touches sockets directly so the
/// router/table can be unit tested without I/O.
pub struct Client<S> {
    pub uid: u32,
    pub tcp_addr: SocketAddr,
    quick_addr: RwLock<Option<SocketAddr>>,
    before_serv_info: AtomicBool,
    active: AtomicBool,
    authed: AtomicBool,
    subscriptions: RwLock<Table<String, bool>>,
    pub sink: S,
}

impl<S> Client<S> {
    pub fn new(uid: u32, tcp_addr: SocketAddr, sink: S) -> Self {
        Self {
            uid,
            tcp_addr,
            quick_addr: RwLock::new(None),
            before_serv_info: AtomicBool::new(true),
            active: AtomicBool::new(false),
            authed: AtomicBool::new(false),
            subscriptions: RwLock::new(Table::default()),
            sink,
        }
    }

    /// True until the first message on this connection has been processed;
    /// the reader must reject anything but ServInfo while this holds.
    pub fn is_before_serv_info(&self) -> bool {
        self.before_serv_info.load(Ordering::Acquire)
    }

    pub fn mark_past_serv_info(&self) {
        self.before_serv_info.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn is_authed(&self) -> bool {
        self.authed.load(Ordering::Acquire)
    }

    pub fn set_authed(&self, authed: bool) {
        self.authed.store(authed, Ordering::Release);
    }

    pub fn quick_addr(&self) -> Option<SocketAddr> {
        *self.quick_addr.read()
    }

    pub fn bind_quick(&self, addr: SocketAddr) {
        *self.quick_addr.write() = Some(addr);
    }

    /// Record a subscription under its *effective* (resolved) URL — see
    /// SPEC_FULL §4.5a.
    pub fn subscribe(&self, effective_url: impl Into<String>) {
        self.subscriptions.write().insert(effective_url.into(), true);
    }

    /// Returns whether the URL was actually subscribed (the reference
    /// implementation no-ops, without sending a wire message, when asked to
    /// unsubscribe a path the client was never subscribed to).
    pub fn unsubscribe(&self, effective_url: &str) -> bool {
        self.subscriptions.write().remove(effective_url).is_some()
    }

    /// Snapshot of subscribed URLs, for the publish engine's fan-out match
    /// against §4.6's hierarchical rule.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().keys().cloned().collect()
    }

    pub fn is_recipient_of(&self, publish_path: &str) -> bool {
        self.subscriptions
            .read()
            .keys()
            .any(|s| vsoa_codec::routing::subscription_matches(s, publish_path))
    }
}

/// All connections currently accepted by the server.
///
/// ```
/// use vsoa_service::client::ClientTable;
///
/// let table: ClientTable<()> = ClientTable::new();
/// let uid = table.next_uid();
/// assert_eq!(uid, 1);
///
/// let addr = "127.0.0.1:9000".parse().unwrap();
/// table.insert(std::sync::Arc::new(vsoa_service::client::Client::new(uid, addr, ())));
/// assert_eq!(table.len(), 1);
///
/// table.remove(uid);
/// assert_eq!(table.len(), 0);
/// ```
pub struct ClientTable<S> {
    uid: AtomicU32,
    clients: RwLock<Table<u32, Arc<Client<S>>>>,
}

impl<S> Default for ClientTable<S> {
    fn default() -> Self {
        Self {
            uid: AtomicU32::new(0),
            clients: RwLock::new(Table::default()),
        }
    }
}

impl<S> ClientTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic uid allocation starting at 1, per §3's invariant.
    pub fn next_uid(&self) -> u32 {
        self.uid.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn insert(&self, client: Arc<Client<S>>) {
        self.clients.write().insert(client.uid, client);
    }

    pub fn remove(&self, uid: u32) -> Option<Arc<Client<S>>> {
        self.clients.write().remove(&uid)
    }

    pub fn get(&self, uid: u32) -> Option<Arc<Client<S>>> {
        self.clients.read().get(&uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of every connected client. The listener's
    /// shutdown path and the publish engine's fan-out both iterate this
    /// instead of the live table, so a concurrent disconnect can't mutate
    /// the map out from under the iterator.
    pub fn snapshot(&self) -> Vec<Arc<Client<S>>> {
        self.clients.read().values().cloned().collect()
    }
}
