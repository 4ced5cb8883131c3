//! Normal (TCP) and quick (UDP) input loops (§4.2): demultiplex replies to
//! pending calls, route Publish frames through subscription/regulator
//! dispatch, and forward anything else unsolicited.

use std::sync::Arc;

use tokio::{
    io::AsyncReadExt,
    net::{UdpSocket, tcp::OwnedReadHalf},
};
use vsoa_codec::{
    channel::{Channel, QUICK_MAX_LEN},
    message::{HEADER_LEN, Message, MessageType, StatusType},
};

use crate::{Error, session::Session};

/// Read framed messages off the TCP socket until it closes or a frame fails
/// to decode catastrophically (bad magic / misaligned / oversize), then mark
/// the session dead.
pub(crate) async fn normal_input_loop(session: Arc<Session>, mut read: OwnedReadHalf) {
    let mut header_buf = [0u8; HEADER_LEN];

    loop {
        if read.read_exact(&mut header_buf).await.is_err() {
            break;
        }

        let total_len = match Message::peek_total_len(&header_buf) {
            Ok(len) => len,
            Err(_) => break,
        };

        let mut frame = vec![0u8; total_len];
        frame[..HEADER_LEN].copy_from_slice(&header_buf);
        if read.read_exact(&mut frame[HEADER_LEN..]).await.is_err() {
            break;
        }

        match Message::decode(&frame, Channel::Normal) {
            Ok(message) => dispatch(&session, message),
            Err(_) => break,
        }
    }

    session.on_fatal_read_error();
}

/// Read datagrams off the UDP socket. Unlike the normal loop, one bad
/// datagram doesn't end the loop — the next one might be fine. Only
/// `Publish` datagrams are meaningful here; a Datagram call never gets a
/// reply (it completes locally on send), so anything else is discarded.
pub(crate) async fn quick_input_loop(session: Arc<Session>, udp: Arc<UdpSocket>) {
    let mut buf = vec![0u8; QUICK_MAX_LEN];

    loop {
        let len = match udp.recv(&mut buf).await {
            Ok(len) => len,
            Err(_) => continue,
        };

        if let Ok(message) = Message::decode(&buf[..len], Channel::Quick) {
            if !message.header.reply && message.header.msg_type == MessageType::Publish {
                session.dispatch_publish(message);
            }
        }
    }
}

/// Complete a pending call with its reply. A non-`Success` status becomes
/// `Error::Status`; `Password` additionally tears the session down, since a
/// rejected ServInfo retry can never succeed without a new session (§4.2).
fn dispatch(session: &Arc<Session>, message: Message) {
    if message.header.reply {
        if let Some(call) = session.pending.take(message.header.seq) {
            let status = message.header.status;
            if status == StatusType::Success {
                call.complete(Ok(message));
            } else {
                call.complete(Err(Error::Status(status)));
                if status == StatusType::Password {
                    let session = session.clone();
                    tokio::spawn(async move {
                        let _ = session.close().await;
                    });
                }
            }
        }
        return;
    }

    match message.header.msg_type {
        MessageType::Publish => session.dispatch_publish(message),
        _ => session.forward_server_message(message),
    }
}
