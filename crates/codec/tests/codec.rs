use bytes::{Bytes, BytesMut};
use vsoa_codec::channel::Channel;
use vsoa_codec::message::{Header, Message, MessageType, RpcMethod, StatusType};
use vsoa_codec::position::{LookUpRequest, Position};
use vsoa_codec::servinfo::{ServInfoReply, ServInfoRequest};
use vsoa_codec::{Error, pool::BufferPool};

#[test]
fn round_trips_through_encode_decode() {
    let mut header = Header::new(MessageType::Rpc);
    header.seq = 42;
    header.rpc_method = RpcMethod::Set;
    header.status = StatusType::Success;

    let msg = Message::new(header, "/vehicle/speed")
        .with_param(Bytes::from_static(b"{\"unit\":\"kph\"}"))
        .with_data(Bytes::from_static(b"\x01\x02\x03"));

    let mut buf = BytesMut::new();
    msg.encode(Channel::Normal, &mut buf).unwrap();
    assert_eq!(buf.len() % 4, 0);

    let decoded = Message::decode(&buf, Channel::Normal).unwrap();
    assert_eq!(decoded.url, "/vehicle/speed");
    assert_eq!(decoded.header.seq, 42);
    assert_eq!(decoded.header.rpc_method, RpcMethod::Set);
    assert_eq!(&decoded.param[..], b"{\"unit\":\"kph\"}");
    assert_eq!(&decoded.data[..], b"\x01\x02\x03");
}

#[test]
fn peek_total_len_matches_encoded_len() {
    let msg = Message::new(Header::new(MessageType::Datagram), "/x").with_data(Bytes::from_static(
        b"hello",
    ));

    let mut buf = BytesMut::new();
    msg.encode(Channel::Normal, &mut buf).unwrap();

    let peeked = Message::peek_total_len(&buf[..20]).unwrap();
    assert_eq!(peeked, buf.len());
    assert_eq!(peeked, msg.encoded_len());
}

#[test]
fn oversize_param_on_normal_channel_is_too_long() {
    let big = vec![0u8; 300 * 1024];
    let msg = Message::new(Header::new(MessageType::Rpc), "/big").with_param(Bytes::from(big));

    let mut buf = BytesMut::new();
    let err = msg.encode(Channel::Normal, &mut buf).unwrap_err();
    assert!(matches!(err, Error::TooLong));
}

#[test]
fn quick_channel_has_a_tighter_limit_than_normal() {
    let payload = vec![0u8; 100_000];
    let msg = Message::new(Header::new(MessageType::Publish), "/p").with_data(Bytes::from(payload));

    let mut buf = BytesMut::new();
    assert!(msg.encode(Channel::Normal, &mut buf).is_ok());
    assert!(matches!(
        msg.encode(Channel::Quick, &mut buf).unwrap_err(),
        Error::TooLong
    ));
}

#[test]
fn misaligned_frame_reports_unpad() {
    // Hand-craft a header claiming a body length that isn't a multiple of 4
    // once you add the (correctly zero) pad recorded in the flags byte.
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[
        0x29, // magic
        MessageType::Rpc as u8,
        0, // flags: pad = 0
        StatusType::Success as u8,
    ]);
    buf.extend_from_slice(&0u32.to_be_bytes()); // seq
    buf.extend_from_slice(&0u16.to_be_bytes()); // tunId
    buf.extend_from_slice(&1u16.to_be_bytes()); // url len = 1 (odd, unaligned)
    buf.extend_from_slice(&0u32.to_be_bytes()); // param len
    buf.extend_from_slice(&0u32.to_be_bytes()); // data len
    buf.extend_from_slice(b"/");

    let err = Message::decode(&buf, Channel::Normal).unwrap_err();
    assert!(matches!(err, Error::UnPad));
}

#[test]
fn servinfo_request_omits_absent_fields() {
    let req = ServInfoRequest::decode(b"{}").unwrap();
    assert_eq!(req, ServInfoRequest::default());

    let req = ServInfoRequest::decode(br#"{"passwd":"123456"}"#).unwrap();
    assert_eq!(req.passwd.as_deref(), Some("123456"));
    assert_eq!(req.ping_interval, None);
}

#[test]
fn servinfo_reply_decodes_both_forms() {
    let json = ServInfoReply::decode(br#"{"info":"rust VSOA server"}"#).unwrap();
    let raw = ServInfoReply::decode(b"rust VSOA server").unwrap();
    assert_eq!(json, raw);
}

#[test]
fn position_round_trips_as_json() {
    let pos = Position {
        name: "ecu-1".into(),
        domain: "vehicle".into(),
        ip: "127.0.0.1".parse().unwrap(),
        port: 3003,
        security: false,
    };

    let encoded = serde_json::to_vec(&pos).unwrap();
    let decoded: Position = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(pos, decoded);

    let req: LookUpRequest = serde_json::from_str(r#"{"name":"ecu-1"}"#).unwrap();
    assert_eq!(req.name, "ecu-1");
}

#[test]
fn buffer_pool_reuses_a_class_and_zeroes_on_release() {
    let pool = BufferPool::new();
    {
        let mut buf = pool.acquire(100);
        buf[0] = 0xff;
    }

    let buf = pool.acquire(100);
    assert!(buf.iter().all(|&b| b == 0));
}
