//! End-to-end check against a minimal hand-rolled TCP peer standing in for
//! a server: handshake, then one RPC round trip.

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use vsoa_client::{Config, Session, Target};
use vsoa_codec::{
    channel::Channel,
    message::{HEADER_LEN, Header, Message, MessageType, RpcMethod, StatusType},
    servinfo::ServInfoReply,
};

async fn read_one_frame(stream: &mut tokio::net::TcpStream) -> Message {
    let mut header_buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_buf).await.unwrap();
    let total = Message::peek_total_len(&header_buf).unwrap();
    let mut frame = vec![0u8; total];
    frame[..HEADER_LEN].copy_from_slice(&header_buf);
    stream.read_exact(&mut frame[HEADER_LEN..]).await.unwrap();
    Message::decode(&frame, Channel::Normal).unwrap()
}

async fn write_one_frame(stream: &mut tokio::net::TcpStream, message: &Message) {
    let mut buf = BytesMut::new();
    message.encode(Channel::Normal, &mut buf).unwrap();
    stream.write_all(&buf).await.unwrap();
    stream.flush().await.unwrap();
}

#[tokio::test]
async fn handshake_then_one_rpc_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let serv_info_request = read_one_frame(&mut stream).await;
        assert_eq!(serv_info_request.header.msg_type, MessageType::ServInfo);

        let reply_param = ServInfoReply::new("test VSOA server").encode_as_string();
        let header = Header::reply_to(&serv_info_request.header, StatusType::Success);
        write_one_frame(&mut stream, &Message::new(header, "").with_param(reply_param)).await;

        let rpc_request = read_one_frame(&mut stream).await;
        assert_eq!(rpc_request.header.msg_type, MessageType::Rpc);
        assert_eq!(rpc_request.url, "/hello");

        let header = Header::reply_to(&rpc_request.header, StatusType::Success);
        write_one_frame(
            &mut stream,
            &Message::new(header, "/hello").with_data(Bytes::from_static(b"world")),
        )
        .await;
    });

    let (server_name, client) = Session::connect(Target::Direct(addr), Config::default())
        .await
        .unwrap();
    assert_eq!(server_name, "test VSOA server");
    assert!(client.is_authed());

    let reply = client
        .call(
            "/hello",
            MessageType::Rpc,
            RpcMethod::Get,
            false,
            Bytes::new(),
            Bytes::new(),
        )
        .await
        .unwrap();
    assert_eq!(&reply.data[..], b"world");

    server.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn bad_password_surfaces_as_a_status_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_one_frame(&mut stream).await;
        let header = Header::reply_to(&request.header, StatusType::Password);
        write_one_frame(&mut stream, &Message::new(header, "")).await;
    });

    let config = Config {
        password: "wrong".into(),
        ..Config::default()
    };
    let result = Session::connect(Target::Direct(addr), config).await;
    assert!(matches!(result, Err(vsoa_client::Error::Status(StatusType::Password))));

    server.await.unwrap();
}
