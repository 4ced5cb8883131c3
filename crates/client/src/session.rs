//! The client session (§4.2): dial, handshake, and the synchronous/async
//! call API. Normal/quick input loops live in [`crate::input`]; the ping
//! loop lives in [`crate::ping`].

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream, UdpSocket,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinHandle,
};
use vsoa_codec::{
    channel::Channel,
    message::{Header, Message, MessageType, RpcMethod, StatusType},
    pool::BufferPool,
    servinfo::{ServInfoReply, ServInfoRequest},
};

use crate::{
    Error,
    dispatcher::{Call, Done, PendingMap},
    input, ping,
    regulator::{Regulator, SlotHandler},
};

/// One entry point into the server: a direct address, or a logical name
/// resolved through the position directory (§4.2, §4.8).
pub enum Target {
    Direct(SocketAddr),
    Logical { name: String, directory: SocketAddr },
}

/// Called once after every successful (re)connect, including the initial
/// one (§4.2 Config `onConnect`).
pub type OnConnectHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Config {
    pub password: String,
    /// `Duration::ZERO` disables the ping loop entirely.
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub ping_lost: u32,
    pub ping_turbo: Option<Duration>,
    pub connect_timeout: Duration,
    pub auto_reconnect: bool,
    pub reconnect_interval: Duration,
    pub on_connect: Option<OnConnectHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            password: String::new(),
            ping_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(3),
            ping_lost: 3,
            ping_turbo: None,
            connect_timeout: Duration::from_secs(5),
            auto_reconnect: false,
            reconnect_interval: Duration::from_secs(1),
            on_connect: None,
        }
    }
}

impl Config {
    /// `pingTurbo` must be in [25, 1000] ms and an integer divisor of
    /// `pingInterval` in milliseconds (§4.2).
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(turbo) = self.ping_turbo {
            let turbo_ms = turbo.as_millis().max(1) as u64;
            if !(25..=1000).contains(&turbo_ms) {
                return Err(Error::Status(StatusType::Arguments));
            }

            let interval_ms = self.ping_interval.as_millis() as u64;
            if interval_ms == 0 || interval_ms % turbo_ms != 0 {
                return Err(Error::Status(StatusType::Arguments));
            }
        }

        Ok(())
    }
}

pub type SubscribeHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// The session. Always held as `Arc<Session>` (aliased [`Client`]) since the
/// input and ping loops each keep their own clone alive.
pub struct Session {
    pub(crate) config: Config,
    target: Target,
    server_addr: RwLock<SocketAddr>,
    local_quick_port: AtomicU16,
    tcp_write: AsyncMutex<OwnedWriteHalf>,
    udp: RwLock<Arc<UdpSocket>>,
    pub(crate) pending: PendingMap,
    subscriptions: RwLock<HashMap<String, SubscribeHandler>>,
    pub(crate) regulator: Arc<Regulator>,
    uid: AtomicU32,
    authed: AtomicBool,
    closing: AtomicBool,
    shutdown: AtomicBool,
    pub(crate) ping_timeout_count: AtomicU32,
    server_message_tx: RwLock<Option<mpsc::Sender<Message>>>,
    pool: BufferPool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A connected session. See [`Session::connect`].
pub type Client = Arc<Session>;

/// Resolve `target` and open fresh TCP/UDP sockets to it. Shared by the
/// initial [`Session::connect`] and [`Session::reconnect`] — a logical
/// target is re-resolved through the position directory on every call, so a
/// redial after the server moved still lands in the right place.
async fn dial(target: &Target, config: &Config) -> Result<(TcpStream, UdpSocket, SocketAddr), Error> {
    let server_addr = match target {
        Target::Direct(addr) => *addr,
        Target::Logical { name, directory } => {
            let position = crate::position::look_up(*directory, name).await?;
            SocketAddr::new(position.ip, position.port)
        }
    };

    let tcp = tokio::time::timeout(config.connect_timeout, TcpStream::connect(server_addr))
        .await
        .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)))??;
    tcp.set_nodelay(true).ok();

    let udp = UdpSocket::bind((server_addr.ip(), 0)).await?;
    udp.connect(server_addr).await?;

    Ok((tcp, udp, server_addr))
}

impl Session {
    pub async fn connect(target: Target, config: Config) -> Result<(String, Client), Error> {
        config.validate()?;

        let (tcp, udp, server_addr) = dial(&target, &config).await?;
        let (tcp_read, tcp_write) = tcp.into_split();
        let local_quick_port = udp.local_addr()?.port();
        let udp = Arc::new(udp);

        let session = Arc::new(Session {
            config,
            target,
            server_addr: RwLock::new(server_addr),
            local_quick_port: AtomicU16::new(local_quick_port),
            tcp_write: AsyncMutex::new(tcp_write),
            udp: RwLock::new(udp.clone()),
            pending: PendingMap::new(),
            subscriptions: RwLock::new(HashMap::new()),
            regulator: Arc::new(Regulator::new()),
            uid: AtomicU32::new(0),
            authed: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            ping_timeout_count: AtomicU32::new(0),
            server_message_tx: RwLock::new(None),
            pool: BufferPool::new(),
            tasks: Mutex::new(Vec::new()),
        });

        session.spawn_input_loops(tcp_read, udp);

        let server_name = session.handshake().await?;

        if session.config.ping_interval > Duration::ZERO {
            ping::spawn(&session);
        }

        if let Some(hook) = &session.config.on_connect {
            hook();
        }

        Ok((server_name, session))
    }

    /// Redial the original target, re-handshake, and restart the ping loop.
    /// Pending calls were already failed by [`Session::on_fatal_read_error`];
    /// subscriptions are not replayed — that's the caller's job (§4.2
    /// "Reconnect").
    async fn reconnect(self: &Arc<Self>) -> Result<String, Error> {
        let (tcp, udp, server_addr) = dial(&self.target, &self.config).await?;
        let (tcp_read, tcp_write) = tcp.into_split();
        let local_quick_port = udp.local_addr()?.port();
        let udp = Arc::new(udp);

        *self.tcp_write.lock().await = tcp_write;
        *self.udp.write() = udp.clone();
        self.local_quick_port.store(local_quick_port, Ordering::Release);
        *self.server_addr.write() = server_addr;

        self.shutdown.store(false, Ordering::Release);
        self.ping_timeout_count.store(0, Ordering::Release);

        self.spawn_input_loops(tcp_read, udp);
        let server_name = self.handshake().await?;

        if self.config.ping_interval > Duration::ZERO {
            ping::spawn(self);
        }

        if let Some(hook) = &self.config.on_connect {
            hook();
        }

        Ok(server_name)
    }

    /// Redial at `reconnectInterval` until one attempt lands or the session
    /// is explicitly closed in the meantime (§4.2 "Reconnect").
    async fn reconnect_loop(self: Arc<Self>) {
        while !self.is_closing() {
            tokio::time::sleep(self.config.reconnect_interval).await;
            if self.is_closing() {
                return;
            }

            match self.reconnect().await {
                Ok(server_name) => {
                    log::info!("vsoa session reconnected to {server_name}");
                    return;
                }
                Err(err) => log::warn!("vsoa reconnect attempt failed: {err}"),
            }
        }
    }

    fn spawn_input_loops(self: &Arc<Self>, tcp_read: OwnedReadHalf, udp: Arc<UdpSocket>) {
        let normal = tokio::spawn(input::normal_input_loop(self.clone(), tcp_read));
        let quick = tokio::spawn(input::quick_input_loop(self.clone(), udp));
        self.tasks.lock().extend([normal, quick]);
    }

    /// Track a background task so [`Session::close`] aborts it instead of
    /// leaving it to poll `is_shutdown` on its own next tick (§5).
    pub(crate) fn track_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    async fn handshake(self: &Arc<Self>) -> Result<String, Error> {
        let param = ServInfoRequest {
            passwd: if self.config.password.is_empty() {
                None
            } else {
                Some(self.config.password.clone())
            },
            ping_interval: Some(self.config.ping_interval.as_secs() as u32),
            ping_timeout: Some(self.config.ping_timeout.as_secs() as u32),
            ping_lost: Some(self.config.ping_lost),
        }
        .encode()?;

        let mut header = Header::new(MessageType::ServInfo);
        header.valid_tun_id = true;
        header.tun_id = self.local_quick_port.load(Ordering::Acquire);

        let call = self
            .send_expect_reply(header, String::new(), param, Bytes::new(), None)
            .await?;
        let reply = call.wait().await?;

        let info = ServInfoReply::decode(&reply.param)?;
        if reply.data.len() >= 4 {
            self.uid
                .store(u32::from_be_bytes(reply.data[..4].try_into().unwrap()), Ordering::Release);
        }
        self.authed.store(true, Ordering::Release);

        Ok(info.info)
    }

    pub fn is_authed(&self) -> bool {
        self.authed.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn uid(&self) -> u32 {
        self.uid.load(Ordering::Acquire)
    }

    /// Register a channel that receives server-initiated pushes the reader
    /// can't correlate to a pending call (§4.2).
    pub fn on_server_message(&self, tx: mpsc::Sender<Message>) {
        *self.server_message_tx.write() = Some(tx);
    }

    // -- dispatch -----------------------------------------------------

    /// `Go(url, type, flags, req, reply, done)` (§4.2, §6).
    pub async fn go(
        self: &Arc<Self>,
        url: &str,
        msg_type: MessageType,
        rpc_method: RpcMethod,
        quick: bool,
        param: Bytes,
        data: Bytes,
        done: Option<Done>,
    ) -> Result<Arc<Call>, Error> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }

        match msg_type {
            MessageType::Rpc | MessageType::Subscribe | MessageType::Unsubscribe | MessageType::PingEcho => {
                let mut header = Header::new(msg_type);
                header.rpc_method = rpc_method;
                self.send_expect_reply(header, url.to_string(), param, data, done)
                    .await
            }
            MessageType::Datagram => self.send_datagram(url, quick, rpc_method, param, data, done).await,
            MessageType::Noop => self.send_noop(done).await,
            MessageType::ServInfo | MessageType::Publish | MessageType::QosSetup => {
                Err(Error::Status(StatusType::Arguments))
            }
        }
    }

    /// `Call(url, type, flags, req)` (§4.2, §6): `Go` plus blocking on the
    /// completion.
    pub async fn call(
        self: &Arc<Self>,
        url: &str,
        msg_type: MessageType,
        rpc_method: RpcMethod,
        quick: bool,
        param: Bytes,
        data: Bytes,
    ) -> Result<Message, Error> {
        let call = self.go(url, msg_type, rpc_method, quick, param, data, None).await?;
        call.wait().await
    }

    async fn send_expect_reply(
        self: &Arc<Self>,
        mut header: Header,
        url: String,
        param: Bytes,
        data: Bytes,
        done: Option<Done>,
    ) -> Result<Arc<Call>, Error> {
        let seq = self.pending.next_seq();
        header.seq = seq;

        let call = Call::new(url.clone(), header.msg_type, header.rpc_method, false, seq, done);
        self.pending.register(call.clone());

        let message = Message {
            header,
            url,
            param,
            data,
        };

        if let Err(err) = self.write_normal(&message).await {
            self.pending.take(seq);
            call.complete(Err(Error::from(err)));
        }

        Ok(call)
    }

    async fn send_datagram(
        self: &Arc<Self>,
        url: &str,
        quick: bool,
        rpc_method: RpcMethod,
        param: Bytes,
        data: Bytes,
        done: Option<Done>,
    ) -> Result<Arc<Call>, Error> {
        let seq = if quick { self.uid() } else { self.pending.next_seq() };

        let mut header = Header::new(MessageType::Datagram);
        header.rpc_method = rpc_method;
        header.seq = seq;

        let call = Call::new(url.to_string(), MessageType::Datagram, rpc_method, quick, seq, done);

        let message = Message {
            header,
            url: url.to_string(),
            param,
            data,
        };

        let result = if quick {
            self.write_quick(&message).await
        } else {
            self.write_normal(&message).await
        };

        // No reply is expected for a Datagram; complete immediately with an
        // empty acknowledgement message, or the send error.
        call.complete(
            result
                .map(|()| Message::new(Header::new(MessageType::Datagram), ""))
                .map_err(Error::from),
        );

        Ok(call)
    }

    async fn send_noop(self: &Arc<Self>, done: Option<Done>) -> Result<Arc<Call>, Error> {
        let seq = self.pending.next_noop_seq();
        let mut header = Header::new(MessageType::Noop);
        header.seq = seq;

        let call = Call::new(String::new(), MessageType::Noop, RpcMethod::Get, false, seq, done);
        let message = Message::new(header, "");

        let result = self.write_normal(&message).await;
        call.complete(
            result
                .map(|()| Message::new(Header::new(MessageType::Noop), ""))
                .map_err(Error::from),
        );

        Ok(call)
    }

    pub(crate) async fn write_normal(&self, message: &Message) -> Result<(), vsoa_codec::Error> {
        let len = message.encoded_len();
        let mut buf = self.pool.acquire(len);
        message.encode(Channel::Normal, &mut buf)?;

        let mut guard = self.tcp_write.lock().await;
        guard.write_all(&buf).await?;
        guard.flush().await?;
        Ok(())
    }

    pub(crate) async fn write_quick(&self, message: &Message) -> Result<(), vsoa_codec::Error> {
        let len = message.encoded_len();
        let mut buf = self.pool.acquire(len);
        message.encode(Channel::Quick, &mut buf)?;
        let udp = self.udp.read().clone();
        udp.send(&buf).await?;
        Ok(())
    }

    // -- subscribe/regulator ------------------------------------------

    pub async fn subscribe(self: &Arc<Self>, url: &str, handler: SubscribeHandler) -> Result<(), Error> {
        if !self.is_authed() {
            return Err(Error::UnAuthed);
        }

        self.call(url, MessageType::Subscribe, RpcMethod::Get, false, Bytes::new(), Bytes::new())
            .await?;

        self.subscriptions.write().insert(url.to_string(), handler);
        Ok(())
    }

    pub async fn unsubscribe(self: &Arc<Self>, url: &str) -> Result<(), Error> {
        if !self.is_authed() {
            return Err(Error::UnAuthed);
        }

        if !self.subscriptions.read().contains_key(url) {
            // Already locally unsubscribed: no wire round-trip, matching the
            // reference client's early return.
            return Ok(());
        }

        self.call(
            url,
            MessageType::Unsubscribe,
            RpcMethod::Get,
            false,
            Bytes::new(),
            Bytes::new(),
        )
        .await?;

        self.subscriptions.write().remove(url);
        self.regulator.unslot(url);
        Ok(())
    }

    pub fn slot(&self, url: &str, handler: SlotHandler) {
        self.regulator.slot(url, handler);
    }

    pub fn unslot(&self, url: &str) {
        self.regulator.unslot(url);
    }

    pub fn start_regulator(self: &Arc<Self>, interval: Duration) {
        self.regulator.start(interval);
    }

    pub fn stop_regulator(&self) {
        self.regulator.stop();
    }

    /// Matches an incoming Publish's URL against both the subscription
    /// table (immediate-delivery handlers) and the regulator's slots
    /// (rate-limited); both may coexist, and the regulator is fed
    /// unconditionally of `Subscribe` state (§4.3).
    pub(crate) fn dispatch_publish(&self, message: Message) {
        self.regulator.feed(&message.url, &message);

        let subscriptions = self.subscriptions.read();
        let entries = subscriptions.iter().map(|(k, v)| (k.as_str(), v));
        if let Some((_, handler)) = vsoa_codec::routing::resolve(entries, &message.url) {
            handler(message);
        }
    }

    // -- stream tunnel / position --------------------------------------

    pub async fn new_client_stream(&self, tun_id: u16) -> Result<TcpStream, Error> {
        let host = self.server_addr.read().ip();
        crate::stream::dial(host, tun_id).await
    }

    // -- teardown -------------------------------------------------------

    pub async fn close(&self) -> Result<(), Error> {
        self.closing.store(true, Ordering::Release);
        self.shutdown.store(true, Ordering::Release);
        self.regulator.stop();
        self.pending.fail_all(|| Error::Shutdown);

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.tcp_write.lock().await.shutdown().await.ok();
        Ok(())
    }

    /// Hand an unsolicited, non-Publish server message to whoever is
    /// listening via [`Session::on_server_message`]; dropped if nobody is.
    pub(crate) fn forward_server_message(&self, message: Message) {
        if let Some(tx) = self.server_message_tx.read().as_ref() {
            let _ = tx.try_send(message);
        }
    }

    /// Called by the input loops when the connection dies unexpectedly:
    /// fails every pending call, flags the session unusable, and — unless
    /// this was an explicit [`Session::close`] — kicks off reconnection if
    /// configured (§4.2 ping loop, "Reconnect").
    pub(crate) fn on_fatal_read_error(self: &Arc<Self>) {
        let was_closing = self.is_closing();
        self.shutdown.store(true, Ordering::Release);
        self.authed.store(false, Ordering::Release);
        self.pending.fail_all(move || {
            if was_closing {
                Error::Shutdown
            } else {
                Error::UnexpectedEof
            }
        });

        if !was_closing && self.config.auto_reconnect {
            let session = self.clone();
            let handle = tokio::spawn(session.reconnect_loop());
            self.track_task(handle);
        }
    }
}
