//! Server-side route table (§3 "Route table", §4.5).
//!
//! The reference route table is a single map keyed by strings like
//! `RPC.<method>.<url>`; here the same three categories (RPC, Datagram,
//! publishable/subscribable URLs) get their own typed map instead of a
//! shared string-keyed one, so a lookup can't accidentally cross
//! categories. The externally observable resolution behavior — exact
//! match, trailing-slash-appended, trailing-slash-stripped, longest
//! registered prefix ending in `/` — is unchanged and lives in
//! `vsoa_codec::routing::resolve`.

use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use parking_lot::RwLock;
use vsoa_codec::{message::RpcMethod, routing};

use crate::Error;

/// A registered, possibly-subscribable publish path and whether its trigger
/// is externally raised (`TriggerPublisher` is only valid against these).
#[derive(Clone, Copy)]
pub struct PublishMeta {
    pub raw_flag: bool,
}

pub struct RouteTable<Rpc, Dgram, Pub> {
    rpc: RwLock<HashMap<RpcMethod, HashMap<String, Arc<Rpc>>>>,
    datagram: RwLock<HashMap<String, Arc<Dgram>>>,
    datagram_default: RwLock<Option<Arc<Dgram>>>,
    publishable: RwLock<HashMap<String, (PublishMeta, Arc<Pub>)>>,
}

impl<Rpc, Dgram, Pub> Default for RouteTable<Rpc, Dgram, Pub> {
    fn default() -> Self {
        Self {
            rpc: RwLock::new(HashMap::new()),
            datagram: RwLock::new(HashMap::new()),
            datagram_default: RwLock::new(None),
            publishable: RwLock::new(HashMap::new()),
        }
    }
}

impl<Rpc, Dgram, Pub> RouteTable<Rpc, Dgram, Pub> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `On(url, method, handler)` (§6).
    pub fn register_rpc(&self, method: RpcMethod, url: &str, handler: Rpc) -> Result<(), Error> {
        let mut rpc = self.rpc.write();
        let by_url = rpc.entry(method).or_insert_with(HashMap::new);
        if by_url.contains_key(url) {
            return Err(Error::AlreadyRegistered);
        }
        by_url.insert(url.to_string(), Arc::new(handler));
        Ok(())
    }

    /// `OnDatagram(url, handler)` (§6).
    pub fn register_datagram(&self, url: &str, handler: Dgram) -> Result<(), Error> {
        let mut datagram = self.datagram.write();
        if datagram.contains_key(url) {
            return Err(Error::AlreadyRegistered);
        }
        datagram.insert(url.to_string(), Arc::new(handler));
        Ok(())
    }

    /// `OnDatagramDefault(handler)` (§6).
    pub fn register_datagram_default(&self, handler: Dgram) -> Result<(), Error> {
        let mut default = self.datagram_default.write();
        if default.is_some() {
            return Err(Error::AlreadyRegistered);
        }
        *default = Some(Arc::new(handler));
        Ok(())
    }

    /// `Publish`/`QuickPublish` (§6): registers `url` as subscribable and
    /// stores its producer.
    pub fn register_publish(
        &self,
        url: &str,
        raw_flag: bool,
        producer: Pub,
    ) -> Result<(), Error> {
        let mut publishable = self.publishable.write();
        if publishable.contains_key(url) {
            return Err(Error::AlreadyRegistered);
        }
        publishable.insert(url.to_string(), (PublishMeta { raw_flag }, Arc::new(producer)));
        Ok(())
    }

    /// Three/four-tier RPC resolution (§4.5).
    pub fn resolve_rpc(&self, method: RpcMethod, url: &str) -> Option<Arc<Rpc>> {
        let rpc = self.rpc.read();
        let by_url = rpc.get(&method)?;
        let entries = by_url.iter().map(|(k, v)| (k.as_str(), v));
        routing::resolve(entries, url).map(|(_, v)| v.clone())
    }

    /// Datagram resolution, falling back to the registered default handler
    /// with no reply ever emitted either way (§4.5).
    pub fn resolve_datagram(&self, url: &str) -> Option<Arc<Dgram>> {
        let datagram = self.datagram.read();
        let entries = datagram.iter().map(|(k, v)| (k.as_str(), v));
        if let Some((_, handler)) = routing::resolve(entries, url) {
            return Some(handler.clone());
        }
        self.datagram_default.read().clone()
    }

    /// Subscribe/Unsubscribe resolution: returns the *effective* URL that
    /// should be recorded on the client (SPEC_FULL §4.5a) plus whether the
    /// matched path is raw-triggered.
    pub fn resolve_subscription(&self, url: &str) -> Option<(String, PublishMeta)> {
        let publishable = self.publishable.read();
        let entries = publishable.iter().map(|(k, (meta, _))| (k.as_str(), meta));
        routing::resolve(entries, url).map(|(k, meta)| (k.to_string(), *meta))
    }

    pub fn publish_producer(&self, url: &str) -> Option<(Arc<Pub>, PublishMeta)> {
        self.publishable
            .read()
            .get(url)
            .map(|(meta, producer)| (producer.clone(), *meta))
    }

    pub fn registered_publish_urls(&self) -> Vec<String> {
        self.publishable.read().keys().cloned().collect()
    }
}
