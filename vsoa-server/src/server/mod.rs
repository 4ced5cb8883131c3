//! The running server: listener state, registration API, and the shared
//! write path used by both the per-connection reader and the publish
//! engine.

pub mod demo;
pub mod dispatch;
pub mod publish;
pub mod stream;
pub mod tcp;
pub mod types;
pub mod udp;

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::BytesMut;
use parking_lot::RwLock;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, UdpSocket, tcp::OwnedWriteHalf},
    sync::{Mutex, mpsc},
};
use vsoa_codec::{
    channel::Channel,
    message::{Message, RpcMethod},
};
use vsoa_service::{
    client::ClientTable,
    publish::PublishTrigger,
    router::RouteTable,
};

use crate::{config::Config, monitor::Monitor};

pub use publish::Cadence;
pub use types::{DatagramHandler, HandlerFuture, OnClientHook, PublishProducer, Reply, Request, RpcHandler};

/// What a `Client<S>` uses to push bytes back to its own connection: one
/// TCP write half, shared between the reader's reply path and the publish
/// engine's fan-out, guarded so only one writer touches the socket at a
/// time.
pub type Sink = Arc<Mutex<OwnedWriteHalf>>;

pub struct Server {
    pub config: Arc<Config>,
    pub monitor: Monitor,
    pub routes: RouteTable<RpcHandler, DatagramHandler, PublishProducer>,
    pub clients: ClientTable<Sink>,
    pub udp: Arc<UdpSocket>,
    tcp_listener: Mutex<Option<TcpListener>>,
    on_client: RwLock<Option<OnClientHook>>,
    raw_senders: RwLock<HashMap<String, mpsc::Sender<()>>>,
    closing: AtomicBool,
}

impl Server {
    /// Bind the normal and quick channel sockets up front, so registration
    /// and `publish` can happen any time after construction, before
    /// [`Server::run`] starts accepting (§5).
    pub async fn bind(config: Arc<Config>, monitor: Monitor) -> io::Result<Arc<Self>> {
        let listen = config.server.listen;
        let tcp_listener = TcpListener::bind(listen).await?;
        let udp = UdpSocket::bind(listen).await?;

        Ok(Arc::new(Self {
            config,
            monitor,
            routes: RouteTable::new(),
            clients: ClientTable::new(),
            udp: Arc::new(udp),
            tcp_listener: Mutex::new(Some(tcp_listener)),
            on_client: RwLock::new(None),
            raw_senders: RwLock::new(HashMap::new()),
            closing: AtomicBool::new(false),
        }))
    }

    /// `On(url, method, handler)` (§6).
    pub fn on(&self, method: RpcMethod, url: &str, handler: RpcHandler) -> Result<(), vsoa_service::Error> {
        self.routes.register_rpc(method, url, handler)
    }

    /// `OnDatagram(url, handler)` (§6).
    pub fn on_datagram(&self, url: &str, handler: DatagramHandler) -> Result<(), vsoa_service::Error> {
        self.routes.register_datagram(url, handler)
    }

    /// `OnDatagramDefault(handler)` (§6).
    pub fn on_datagram_default(&self, handler: DatagramHandler) -> Result<(), vsoa_service::Error> {
        self.routes.register_datagram_default(handler)
    }

    /// `OnClient(handler)` (§6): decides whether a freshly-handshaken
    /// client is authed.
    pub fn on_client(&self, hook: OnClientHook) {
        *self.on_client.write() = Some(hook);
    }

    pub(crate) fn decide_authed(&self, uid: u32) -> bool {
        match self.on_client.read().as_ref() {
            Some(hook) => hook(uid, self.config.server.auto_auth),
            None => self.config.server.auto_auth,
        }
    }

    /// `Publish(url, cadence, producer)` (§6): registers `url` as
    /// subscribable and starts its fan-out task on the normal channel.
    pub fn publish(
        self: &Arc<Self>,
        url: impl Into<String>,
        cadence: Cadence,
        producer: PublishProducer,
    ) -> Result<(), vsoa_service::Error> {
        self.spawn_publisher(url.into(), cadence, producer, false)
    }

    /// `QuickPublish(url, cadence, producer)` (§6): same, but fans out on
    /// the quick (UDP) channel.
    pub fn quick_publish(
        self: &Arc<Self>,
        url: impl Into<String>,
        cadence: Cadence,
        producer: PublishProducer,
    ) -> Result<(), vsoa_service::Error> {
        self.spawn_publisher(url.into(), cadence, producer, true)
    }

    fn spawn_publisher(
        self: &Arc<Self>,
        url: String,
        cadence: Cadence,
        producer: PublishProducer,
        quick: bool,
    ) -> Result<(), vsoa_service::Error> {
        let raw_flag = matches!(cadence, Cadence::External);
        self.routes.register_publish(&url, raw_flag, producer)?;

        let trigger = match cadence {
            Cadence::Timer(interval) => PublishTrigger::Timer(interval),
            Cadence::External => {
                let (tx, rx) = mpsc::channel(1);
                self.raw_senders.write().insert(url.clone(), tx);
                PublishTrigger::External(rx)
            }
        };

        let server = self.clone();
        tokio::spawn(publish::run(server, url, trigger, quick));
        Ok(())
    }

    /// `TriggerPublisher(url)` (§6): fires one tick of a raw-triggered
    /// publish path out of band.
    pub async fn trigger_publisher(&self, url: &str) -> Result<(), vsoa_service::Error> {
        let sender = self
            .raw_senders
            .read()
            .get(url)
            .cloned()
            .ok_or(vsoa_service::Error::NotRawPublishUrl)?;
        let _ = sender.send(()).await;
        Ok(())
    }

    /// `Count()` (§6): number of currently connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// `Close()` (§6): stop accepting and let in-flight tasks drain on
    /// their own; existing connections are not forcibly severed.
    pub fn close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// `Serve()` (§6): run the accept loop and the quick-channel reader
    /// until [`Server::close`] is called. Also starts the position
    /// directory, if configured (§4.8).
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = self
            .tcp_listener
            .lock()
            .await
            .take()
            .expect("Server::run called more than once");

        if let Some(position) = self.config.position.clone() {
            let directory = crate::position::PositionDirectory::new();
            directory.add(vsoa_codec::position::Position {
                name: position.name.clone(),
                domain: position.domain.clone(),
                ip: self.config.server.listen.ip(),
                port: self.config.server.listen.port(),
                security: position.security,
            });
            let bind = position.directory;
            tokio::spawn(async move {
                if let Err(err) = directory.serve(bind).await {
                    log::error!("position directory on {bind} stopped: {err}");
                }
            });
            log::info!("position directory listening on {bind}, self-registered as {}", position.name);
        }

        log::info!("vsoa server listening (normal+quick) on {}", self.config.server.listen);

        let udp_loop = tokio::spawn(udp::recv_loop(self.clone()));
        tcp::accept_loop(self.clone(), listener).await;
        udp_loop.abort();
        Ok(())
    }
}

/// Encode and write `message` on `channel` through `sink`, the one helper
/// shared by the reply path (§4.4) and the publish fan-out (§4.6).
pub(crate) async fn write_message(sink: &Sink, channel: Channel, message: &Message) -> Result<(), vsoa_codec::Error> {
    let mut buf = BytesMut::new();
    message.encode(channel, &mut buf)?;
    let mut guard = sink.lock().await;
    guard
        .write_all(&buf)
        .await
        .map_err(vsoa_codec::Error::Io)?;
    guard.flush().await.map_err(vsoa_codec::Error::Io)
}
