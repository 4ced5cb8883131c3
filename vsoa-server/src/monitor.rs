//! Per-client traffic counters (§5 "shared resources"), adapted from the
//! teacher's worker-cluster monitor: instead of per-worker UDP node stats,
//! this tracks per-connected-client byte/packet counts so `Count() `-style
//! introspection and future admin tooling have somewhere to read from.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ahash::AHashMap;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedBytes(usize),
    SendBytes(usize),
    ReceivedPkts(usize),
    SendPkts(usize),
}

#[derive(Default)]
struct Count(AtomicUsize);

impl Count {
    fn add(&self, value: usize) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Counts {
    received_bytes: Count,
    send_bytes: Count,
    received_pkts: Count,
    send_pkts: Count,
}

impl Counts {
    fn add(&self, stat: Stats) {
        match stat {
            Stats::ReceivedBytes(v) => self.received_bytes.add(v),
            Stats::ReceivedPkts(v) => self.received_pkts.add(v),
            Stats::SendBytes(v) => self.send_bytes.add(v),
            Stats::SendPkts(v) => self.send_pkts.add(v),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCounts {
    pub received_bytes: usize,
    pub send_bytes: usize,
    pub received_pkts: usize,
    pub send_pkts: usize,
}

#[derive(Clone, Default)]
pub struct Monitor {
    clients: Arc<RwLock<AHashMap<u32, Counts>>>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, uid: u32) {
        self.clients.write().insert(uid, Counts::default());
    }

    pub fn untrack(&self, uid: u32) {
        self.clients.write().remove(&uid);
    }

    pub fn record(&self, uid: u32, stat: Stats) {
        if let Some(counts) = self.clients.read().get(&uid) {
            counts.add(stat);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn snapshot(&self, uid: u32) -> Option<ClientCounts> {
        self.clients.read().get(&uid).map(|counts| ClientCounts {
            received_bytes: counts.received_bytes.get(),
            send_bytes: counts.send_bytes.get(),
            received_pkts: counts.received_pkts.get(),
            send_pkts: counts.send_pkts.get(),
        })
    }
}
