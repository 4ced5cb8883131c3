//! Handler contracts for the server's registration API (§6 "Server API").
//! Handler *bodies* are out of scope; this module only fixes the shapes a
//! caller fills in, and the futures they may return (handlers run from a
//! per-request task, per §4.4, so async bodies are the natural shape).

use std::{future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use vsoa_codec::message::{RpcMethod, StatusType};

pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What an RPC/Datagram handler sees: the request's URL, method, and body.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub rpc_method: RpcMethod,
    pub param: Bytes,
    pub data: Bytes,
    pub client_uid: u32,
}

/// What an RPC handler produces; `tun_id`/`valid_tun_id` let a handler open
/// a stream tunnel (§4.7) via [`crate::server::stream`] before replying.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusType,
    pub param: Bytes,
    pub data: Bytes,
    pub tun_id: u16,
    pub valid_tun_id: bool,
}

impl Reply {
    pub fn success() -> Self {
        Self::status(StatusType::Success)
    }

    pub fn status(status: StatusType) -> Self {
        Self {
            status,
            param: Bytes::new(),
            data: Bytes::new(),
            tun_id: 0,
            valid_tun_id: false,
        }
    }

    pub fn with_param(mut self, param: Bytes) -> Self {
        self.param = param;
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    pub fn with_tunnel(mut self, tun_id: u16) -> Self {
        self.tun_id = tun_id;
        self.valid_tun_id = true;
        self
    }
}

pub type RpcHandler = Box<dyn Fn(Request) -> HandlerFuture<Reply> + Send + Sync>;
pub type DatagramHandler = Box<dyn Fn(Request) -> HandlerFuture<()> + Send + Sync>;

/// Fills a publish template once per tick/trigger (§4.6); the same
/// `(param, data)` pair is fanned out to every recipient of that tick.
pub type PublishProducer = Box<dyn Fn() -> (Bytes, Bytes) + Send + Sync>;

/// `OnClient(handler)` (§6): decides whether a freshly-handshaken client is
/// `authed`, given the server's `auto_auth` default.
pub type OnClientHook = Arc<dyn Fn(u32, bool) -> bool + Send + Sync>;
