//! End-to-end checks against a real [`vsoa_server::server::Server`], driven
//! by the real `vsoa-client` session.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use vsoa_client::{Config as ClientConfig, Session, Target};
use vsoa_codec::message::{MessageType, RpcMethod};
use vsoa_server::{
    config::Config,
    monitor::Monitor,
    server::{Cadence, HandlerFuture, Reply, Request, Server, demo},
};

async fn spawn_server(listen: SocketAddr) -> Arc<Server> {
    let mut config = Config::default();
    config.server.listen = listen;
    Server::bind(Arc::new(config), Monitor::new()).await.unwrap()
}

#[tokio::test]
async fn handshake_and_rpc_round_trip() {
    let listen: SocketAddr = "127.0.0.1:28551".parse().unwrap();
    let server = spawn_server(listen).await;

    server
        .on(
            RpcMethod::Get,
            "/hello",
            Box::new(|_request: Request| -> HandlerFuture<Reply> {
                Box::pin(async move { Reply::success().with_data(Bytes::from_static(b"world")) })
            }),
        )
        .unwrap();

    let running = tokio::spawn(server.clone().run());

    let (name, client) = Session::connect(Target::Direct(listen), ClientConfig::default())
        .await
        .unwrap();
    assert!(client.is_authed());
    assert_eq!(name, "rust VSOA server");

    let reply = client
        .call("/hello", MessageType::Rpc, RpcMethod::Get, false, Bytes::new(), Bytes::new())
        .await
        .unwrap();
    assert_eq!(&reply.data[..], b"world");
    assert_eq!(server.count(), 1);

    client.close().await.unwrap();
    server.close();
    running.abort();
}

#[tokio::test]
async fn download_rpc_opens_a_stream_tunnel_carrying_the_payload() {
    let listen: SocketAddr = "127.0.0.1:28553".parse().unwrap();
    let server = spawn_server(listen).await;
    demo::register(&server).unwrap();

    let running = tokio::spawn(server.clone().run());

    let (_, client) = Session::connect(Target::Direct(listen), ClientConfig::default())
        .await
        .unwrap();

    let reply = client
        .call("/download", MessageType::Rpc, RpcMethod::Get, false, Bytes::new(), Bytes::new())
        .await
        .unwrap();
    assert!(reply.header.valid_tun_id);

    let mut tunnel = client.new_client_stream(reply.header.tun_id).await.unwrap();
    let mut received = Vec::new();
    tunnel.read_to_end(&mut received).await.unwrap();
    assert_eq!(&received[..], b"vsoa stream tunnel demo payload\n");

    client.close().await.unwrap();
    server.close();
    running.abort();
}

#[tokio::test]
async fn subscribe_then_triggered_publish_is_delivered() {
    let listen: SocketAddr = "127.0.0.1:28552".parse().unwrap();
    let server = spawn_server(listen).await;

    server
        .publish(
            "/status",
            Cadence::External,
            Box::new(|| (Bytes::from_static(b"{}"), Bytes::from_static(b"up"))),
        )
        .unwrap();

    let running = tokio::spawn(server.clone().run());

    let (_, client) = Session::connect(Target::Direct(listen), ClientConfig::default())
        .await
        .unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    client
        .subscribe(
            "/status",
            Arc::new(move |message| {
                let _ = tx.try_send(message);
            }),
        )
        .await
        .unwrap();

    // give the subscribe reply a moment to land before triggering.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.trigger_publisher("/status").await.unwrap();

    let published = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&published.data[..], b"up");

    client.close().await.unwrap();
    server.close();
    running.abort();
}
