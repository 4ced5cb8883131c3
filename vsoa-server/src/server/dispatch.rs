//! The server router dispatch (§4.5): resolves a decoded message against
//! the registered routes and, for request/reply types, builds the reply.
//! Shared between the TCP reader (all message types) and the UDP listener
//! (`Datagram` only, §9 open question a).

use std::sync::Arc;

use vsoa_codec::message::{Header, Message, MessageType, StatusType};
use vsoa_service::client::Client;

use super::{
    Server, Sink,
    types::{Reply, Request},
};

fn request_from(message: &Message, client_uid: u32) -> Request {
    Request {
        url: message.url.clone(),
        rpc_method: message.header.rpc_method,
        param: message.param.clone(),
        data: message.data.clone(),
        client_uid,
    }
}

fn reply_message(request: &Message, reply: Reply) -> Message {
    let mut header = Header::reply_to(&request.header, reply.status);
    header.valid_tun_id = reply.valid_tun_id;
    header.tun_id = reply.tun_id;
    Message::new(header, request.url.clone())
        .with_param(reply.param)
        .with_data(reply.data)
}

/// Handle a request already known to be past ServInfo. Returns `Some` when
/// a reply must go out on the normal channel (never for `Datagram`/`Noop`).
pub(super) async fn handle(
    server: &Arc<Server>,
    client: &Arc<Client<Sink>>,
    message: Message,
) -> Option<Message> {
    match message.header.msg_type {
        MessageType::Rpc => {
            let handler = server.routes.resolve_rpc(message.header.rpc_method, &message.url);
            let reply = match handler {
                Some(handler) => handler(request_from(&message, client.uid)).await,
                None => Reply::status(StatusType::InvalidUrl),
            };
            Some(reply_message(&message, reply))
        }

        MessageType::Subscribe => {
            let reply = match server.routes.resolve_subscription(&message.url) {
                Some((effective_url, _meta)) => {
                    client.subscribe(effective_url);
                    Reply::success()
                }
                None => Reply::status(StatusType::InvalidUrl),
            };
            Some(reply_message(&message, reply))
        }

        MessageType::Unsubscribe => {
            let reply = match server.routes.resolve_subscription(&message.url) {
                Some((effective_url, _meta)) => {
                    client.unsubscribe(&effective_url);
                    Reply::success()
                }
                None => Reply::status(StatusType::InvalidUrl),
            };
            Some(reply_message(&message, reply))
        }

        MessageType::Datagram => {
            if let Some(handler) = server.routes.resolve_datagram(&message.url) {
                let request = request_from(&message, client.uid);
                tokio::spawn(async move { handler(request).await });
            }
            None
        }

        MessageType::PingEcho => Some(reply_message(&message, Reply::success())),

        MessageType::Noop => None,

        MessageType::ServInfo | MessageType::Publish | MessageType::QosSetup => {
            log::warn!(
                "client {} sent unexpected {:?} after handshake",
                client.uid,
                message.header.msg_type
            );
            None
        }
    }
}
