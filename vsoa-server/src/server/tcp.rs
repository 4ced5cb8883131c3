//! The normal-channel accept loop and per-connection reader (§4.4).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::{BufMut, BytesMut};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
};
use vsoa_codec::{
    channel::Channel,
    message::{HEADER_LEN, Header, Message, MessageType, StatusType},
    servinfo::{ServInfoReply, ServInfoRequest},
};
use vsoa_service::client::Client;

use super::{Server, Sink, dispatch};
use crate::monitor::Stats;

/// Exponential backoff on recoverable accept errors (§4.4), matching the
/// reference's 5 ms..1 s range.
pub(super) async fn accept_loop(server: Arc<Server>, listener: TcpListener) {
    let mut backoff = Duration::from_millis(5);

    loop {
        if server.is_closing() {
            break;
        }

        match listener.accept().await {
            Ok((stream, addr)) => {
                backoff = Duration::from_millis(5);
                stream.set_nodelay(true).ok();
                let server = server.clone();
                tokio::spawn(async move { connection(server, stream, addr).await });
            }
            Err(err) => {
                log::warn!("accept error: {err}, backing off {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(1));
            }
        }
    }
}

async fn read_frame(read: &mut OwnedReadHalf, timeout: Duration) -> std::io::Result<Message> {
    let fut = async {
        let mut header = [0u8; HEADER_LEN];
        read.read_exact(&mut header).await?;

        let total = Message::peek_total_len(&header)
            .map_err(|err| std::io::Error::other(format!("{err:?}")))?;
        let mut frame = vec![0u8; total];
        frame[..HEADER_LEN].copy_from_slice(&header);
        read.read_exact(&mut frame[HEADER_LEN..]).await?;

        Message::decode(&frame, Channel::Normal).map_err(|err| std::io::Error::other(format!("{err:?}")))
    };

    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))?
}

async fn connection(server: Arc<Server>, stream: TcpStream, addr: SocketAddr) {
    let (mut read, write) = stream.into_split();
    let sink: Sink = Arc::new(tokio::sync::Mutex::new(write));
    let read_timeout = server.config.server.read_timeout();

    let first = match read_frame(&mut read, read_timeout).await {
        Ok(message) => message,
        Err(err) => {
            log::debug!("connection from {addr} dropped before handshake: {err}");
            return;
        }
    };

    if first.header.msg_type != MessageType::ServInfo {
        log::debug!("connection from {addr} sent {:?} before ServInfo, closing", first.header.msg_type);
        return;
    }

    let client = match handshake(&server, addr, &sink, &first).await {
        Some(client) => client,
        None => return,
    };

    log::info!("client {} ({addr}) handshake complete", client.uid);

    loop {
        let message = match read_frame(&mut read, read_timeout).await {
            Ok(message) => message,
            Err(err) => {
                log::debug!("client {} read error: {err}", client.uid);
                break;
            }
        };

        server.monitor.record(client.uid, Stats::ReceivedBytes(message.encoded_len()));
        server.monitor.record(client.uid, Stats::ReceivedPkts(1));

        let server = server.clone();
        let client = client.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            if let Some(reply) = dispatch::handle(&server, &client, message).await {
                match super::write_message(&sink, Channel::Normal, &reply).await {
                    Ok(()) => server.monitor.record(client.uid, Stats::SendPkts(1)),
                    Err(err) => log::warn!("write reply to client {} failed: {err:?}", client.uid),
                }
            }
        });
    }

    server.clients.remove(client.uid);
    server.monitor.untrack(client.uid);
    log::info!("client {} ({addr}) disconnected", client.uid);
}

/// The ServInfo handler (§4.4): checks the password, binds the quick
/// channel if a `tunId` was offered, decides `authed` via `OnClient`, and
/// replies with the server name and the freshly-minted uid.
async fn handshake(
    server: &Arc<Server>,
    addr: SocketAddr,
    sink: &Sink,
    request: &Message,
) -> Option<Arc<Client<Sink>>> {
    let info = ServInfoRequest::decode(&request.param).unwrap_or_default();
    let configured = &server.config.server.password;
    let password_ok = configured.is_empty() || info.passwd.as_deref() == Some(configured.as_str());

    if !password_ok {
        let header = Header::reply_to(&request.header, StatusType::Password);
        let reply = Message::new(header, request.url.clone());
        let _ = super::write_message(sink, Channel::Normal, &reply).await;
        log::info!("rejecting {addr}: bad password");
        return None;
    }

    let uid = server.clients.next_uid();
    let client = Arc::new(Client::new(uid, addr, sink.clone()));
    client.mark_past_serv_info();
    client.activate();

    if request.header.valid_tun_id && request.header.tun_id != 0 {
        client.bind_quick(SocketAddr::new(addr.ip(), request.header.tun_id));
    }

    client.set_authed(server.decide_authed(uid));
    server.clients.insert(client.clone());
    server.monitor.track(uid);

    let reply_param = ServInfoReply::new(server.config.server.name.clone()).encode_as_string();
    let header = Header::reply_to(&request.header, StatusType::Success);
    let mut data = BytesMut::with_capacity(4);
    data.put_u32(uid);

    let reply = Message::new(header, request.url.clone())
        .with_param(reply_param)
        .with_data(data.freeze());
    let _ = super::write_message(sink, Channel::Normal, &reply).await;

    Some(client)
}
