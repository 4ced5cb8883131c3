//! Keepalive (§4.4): a `PingEcho` loop at `pingInterval`, plus an optional
//! faster "turbo" loop that keeps the TCP write path exercised with `Noop`
//! frames whenever calls are outstanding.

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use bytes::Bytes;
use tokio::time::{interval, timeout};
use vsoa_codec::message::{MessageType, RpcMethod};

use crate::session::Session;

pub(crate) fn spawn(session: &Arc<Session>) {
    let ping = tokio::spawn(ping_loop(session.clone()));
    session.track_task(ping);

    if let Some(turbo_interval) = session.config.ping_turbo {
        let turbo = tokio::spawn(turbo_loop(session.clone(), turbo_interval));
        session.track_task(turbo);
    }
}

/// A timed-out or errored ping increments the loss counter; a successful one
/// resets it to zero. Crossing `pingLost` kills the session the same way an
/// unexpected socket close does.
async fn ping_loop(session: Arc<Session>) {
    let mut ticker = interval(session.config.ping_interval);

    loop {
        ticker.tick().await;

        if session.is_shutdown() {
            break;
        }

        let outcome = timeout(
            session.config.ping_timeout,
            session.call(
                "",
                MessageType::PingEcho,
                RpcMethod::Get,
                false,
                Bytes::new(),
                Bytes::new(),
            ),
        )
        .await;

        match outcome {
            Ok(Ok(_)) => session.ping_timeout_count.store(0, Ordering::Release),
            _ => {
                let losses = session.ping_timeout_count.fetch_add(1, Ordering::AcqRel) + 1;
                if losses >= session.config.ping_lost {
                    session.on_fatal_read_error();
                    break;
                }
            }
        }
    }
}

async fn turbo_loop(session: Arc<Session>, turbo_interval: Duration) {
    let mut ticker = interval(turbo_interval);

    loop {
        ticker.tick().await;

        if session.is_shutdown() {
            break;
        }

        if !session.pending.is_empty() {
            let _ = session
                .go(
                    "",
                    MessageType::Noop,
                    RpcMethod::Get,
                    false,
                    Bytes::new(),
                    Bytes::new(),
                    None,
                )
                .await;
        }
    }
}
