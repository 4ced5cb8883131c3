//! The quick-channel reader: one shared UDP socket, matching each inbound
//! datagram's sender address against a known client's bound quick address
//! before routing it as a `Datagram` message (§4.4, §9 open question a —
//! only already-handshaken clients may use the quick channel). Anything
//! other than `Datagram` arriving here is silently dropped: the quick
//! channel never carries a reply, so an RPC/Subscribe/PingEcho frame sent
//! over UDP by mistake gets no response at all, not a misrouted one.

use std::sync::Arc;

use vsoa_codec::{
    channel::Channel,
    message::{Message, MessageType},
};

use super::{Server, types::Request};
use crate::monitor::Stats;

pub(super) async fn recv_loop(server: Arc<Server>) {
    let mut buf = vec![0u8; vsoa_codec::channel::QUICK_MAX_LEN];

    loop {
        if server.is_closing() {
            break;
        }

        let (len, addr) = match server.udp.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(err) => {
                log::warn!("quick channel recv error: {err}");
                continue;
            }
        };

        let message = match Message::decode(&buf[..len], Channel::Quick) {
            Ok(message) => message,
            Err(err) => {
                log::debug!("quick channel dropping malformed datagram from {addr}: {err:?}");
                continue;
            }
        };

        let client = server
            .clients
            .snapshot()
            .into_iter()
            .find(|c| c.quick_addr() == Some(addr));

        let Some(client) = client else {
            log::debug!("quick channel dropping datagram from unrecognized sender {addr}");
            continue;
        };

        server.monitor.record(client.uid, Stats::ReceivedBytes(len));
        server.monitor.record(client.uid, Stats::ReceivedPkts(1));

        if message.header.msg_type != MessageType::Datagram {
            log::debug!(
                "quick channel ignoring {:?} from client {} (datagram-only)",
                message.header.msg_type,
                client.uid
            );
            continue;
        }

        let Some(handler) = server.routes.resolve_datagram(&message.url) else {
            continue;
        };

        let request = Request {
            url: message.url.clone(),
            rpc_method: message.header.rpc_method,
            param: message.param.clone(),
            data: message.data.clone(),
            client_uid: client.uid,
        };
        tokio::spawn(async move { handler(request).await });
    }
}
