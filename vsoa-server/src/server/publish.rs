//! The publish engine (§4.6): one task per registered path, firing on a
//! timer or on an externally-raised trigger, fanning out concurrently to
//! every currently-subscribed client within a per-tick deadline.

use std::{sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use vsoa_codec::{
    channel::Channel,
    message::{Header, Message, MessageType},
};
use vsoa_service::{client::Client, publish::PublishTrigger};

use super::{Server, Sink};

/// What makes a registered publish path fire, at the `vsoa-server` API
/// surface: `External` hides the channel plumbing needed to support
/// `trigger_publisher` behind [`Server::publish`]/[`Server::quick_publish`].
pub enum Cadence {
    Timer(Duration),
    External,
}

pub(super) async fn run(server: Arc<Server>, url: String, trigger: PublishTrigger, quick: bool) {
    let Some((producer, _meta)) = server.routes.publish_producer(&url) else {
        log::error!("publish task for {url} started with no registered producer");
        return;
    };

    let channel = if quick { Channel::Quick } else { Channel::Normal };

    match trigger {
        PublishTrigger::Timer(interval) => {
            let mut ticker = tokio::time::interval(interval);
            let deadline = Duration::from_nanos(((interval.as_nanos() as u64) * 4 / 5).max(1));
            loop {
                ticker.tick().await;
                if server.is_closing() {
                    break;
                }
                if !fire(&server, &url, &producer, channel, deadline).await {
                    break;
                }
            }
        }
        PublishTrigger::External(mut rx) => {
            while rx.recv().await.is_some() {
                if server.is_closing() {
                    break;
                }
                let recipients = server.clients.snapshot();
                let deadline = Duration::from_millis(recipients.len().max(1) as u64);
                if !fire(&server, &url, &producer, channel, deadline).await {
                    break;
                }
            }
        }
    }
}

/// Returns `false` if encoding failed (a programmer error — the producer's
/// payload doesn't fit `channel`'s size limit), signalling the caller to
/// stop this publisher.
async fn fire(
    server: &Arc<Server>,
    url: &str,
    producer: &super::types::PublishProducer,
    channel: Channel,
    deadline: Duration,
) -> bool {
    let (param, data) = producer();

    let message = Message {
        header: Header::new(MessageType::Publish),
        url: url.to_string(),
        param,
        data,
    };

    let mut buf = BytesMut::new();
    if let Err(err) = message.encode(channel, &mut buf) {
        log::error!("publish payload for {url} does not fit {channel:?}: {err:?}");
        return false;
    }
    let encoded = buf.freeze();

    let recipients: Vec<Arc<Client<Sink>>> = server
        .clients
        .snapshot()
        .into_iter()
        .filter(|c| c.is_recipient_of(url))
        .collect();

    let sends = recipients
        .into_iter()
        .map(|client| tokio::spawn(send_to_client(client, channel, encoded.clone(), server.udp.clone(), deadline)));

    let _ = tokio::time::timeout(deadline, async {
        for send in sends {
            let _ = send.await;
        }
    })
    .await;

    true
}

async fn send_to_client(
    client: Arc<Client<Sink>>,
    channel: Channel,
    encoded: Bytes,
    udp: Arc<tokio::net::UdpSocket>,
    deadline: Duration,
) {
    let result: Result<std::io::Result<()>, tokio::time::error::Elapsed> = match channel {
        Channel::Normal => {
            let write = client.sink.clone();
            tokio::time::timeout(deadline, async move {
                let mut guard = write.lock().await;
                guard.write_all(&encoded).await?;
                guard.flush().await
            })
            .await
        }
        Channel::Quick => match client.quick_addr() {
            Some(addr) => {
                tokio::time::timeout(deadline, async move { udp.send_to(&encoded, addr).await.map(|_| ()) }).await
            }
            None => return,
        },
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("publish write to client {} failed: {err}", client.uid),
        Err(_) => log::warn!("publish write to client {} timed out", client.uid),
    }
}
