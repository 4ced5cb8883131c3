//! A single built-in route exercising the stream tunnel end to end (§4.7):
//! `/download` hands back a fixed payload over a freshly bound tunnel
//! instead of the normal channel, so a fresh deployment has something to
//! point `NewServerStream`-style clients at without writing a handler
//! first.

use std::sync::Arc;

use vsoa_codec::message::{RpcMethod, StatusType};

use super::{
    Server,
    stream::{accept_once, bind_ephemeral, run_tunnel},
    types::{HandlerFuture, Reply, Request},
};

const PAYLOAD: &[u8] = b"vsoa stream tunnel demo payload\n";

pub fn register(server: &Arc<Server>) -> Result<(), vsoa_service::Error> {
    let server = server.clone();
    server.on(
        RpcMethod::Get,
        "/download",
        Box::new(move |_request: Request| -> HandlerFuture<Reply> {
            let server = server.clone();
            Box::pin(async move {
                let host = server.config.server.listen.ip();
                let (port, listener) = match bind_ephemeral(host).await {
                    Ok(bound) => bound,
                    Err(err) => {
                        log::warn!("/download: failed to bind tunnel listener: {err}");
                        return Reply::status(StatusType::NoMemory);
                    }
                };

                tokio::spawn(async move {
                    match accept_once(listener).await {
                        Ok(tunnel) => {
                            if let Err(err) = run_tunnel(tunnel, PAYLOAD, tokio::io::sink()).await {
                                log::warn!("/download tunnel failed: {err}");
                            }
                        }
                        Err(err) => log::warn!("/download tunnel accept failed: {err}"),
                    }
                });

                Reply::success().with_tunnel(port)
            })
        }),
    )
}
