//! Frame header and message encode/decode.
//!
//! Wire layout (big-endian), 10-byte header followed by three length-prefixed
//! fields and 0-3 zero pad bytes:
//!
//! ```text
//! byte 0      magic/version (0x29)
//! byte 1      message type
//! byte 2      flags: bit0=reply bit1=validTunId bit2=rpcMethod bits6-7=padLen
//! byte 3      status
//! bytes 4-7   seq (u32)
//! bytes 8-9   tunId (u16)
//! bytes 10-11 url length (u16)
//! bytes 12-15 param length (u32)
//! bytes 16-19 data length (u32)
//! url | param | data | pad
//! ```

use crate::{Error, channel::Channel};

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAGIC: u8 = 0x29;
pub const HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    ServInfo = 0,
    Rpc = 1,
    Subscribe = 2,
    Unsubscribe = 3,
    Publish = 4,
    Datagram = 5,
    QosSetup = 6,
    Noop = 0xfe,
    PingEcho = 0xff,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::ServInfo,
            1 => Self::Rpc,
            2 => Self::Subscribe,
            3 => Self::Unsubscribe,
            4 => Self::Publish,
            5 => Self::Datagram,
            6 => Self::QosSetup,
            0xfe => Self::Noop,
            0xff => Self::PingEcho,
            _ => return Err(Error::InvalidField),
        })
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusType {
    Success = 0,
    Password = 1,
    Arguments = 2,
    InvalidUrl = 3,
    NoResponding = 4,
    NoPermissions = 5,
    NoMemory = 6,
}

impl StatusType {
    /// Text used as the error message of a non-[`StatusType::Success`] reply.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Password => "Password",
            Self::Arguments => "Arguments",
            Self::InvalidUrl => "InvalidUrl",
            Self::NoResponding => "NoResponding",
            Self::NoPermissions => "NoPermissions",
            Self::NoMemory => "NoMemory",
        }
    }
}

impl TryFrom<u8> for StatusType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Success,
            1 => Self::Password,
            2 => Self::Arguments,
            3 => Self::InvalidUrl,
            4 => Self::NoResponding,
            5 => Self::NoPermissions,
            6 => Self::NoMemory,
            _ => return Err(Error::InvalidField),
        })
    }
}

impl From<StatusType> for u8 {
    fn from(value: StatusType) -> Self {
        value as u8
    }
}

/// `RPC.<method>.<url>` route-key discriminant; GET/SET are caller-defined
/// semantics, not enforced by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    Get,
    Set,
}

impl RpcMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Set => "SET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub reply: bool,
    pub valid_tun_id: bool,
    pub rpc_method: RpcMethod,
    pub status: StatusType,
    pub seq: u32,
    pub tun_id: u16,
}

impl Header {
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            reply: false,
            valid_tun_id: false,
            rpc_method: RpcMethod::Get,
            status: StatusType::Success,
            seq: 0,
            tun_id: 0,
        }
    }

    /// Build the header of a reply, echoing `seq` and carrying `status`.
    pub fn reply_to(request: &Header, status: StatusType) -> Self {
        Self {
            msg_type: request.msg_type,
            reply: true,
            valid_tun_id: false,
            rpc_method: request.rpc_method,
            status,
            seq: request.seq,
            tun_id: 0,
        }
    }
}

/// A decoded (or to-be-encoded) VSOA message: header plus the URL, Param
/// (raw JSON bytes), and Data fields.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub url: String,
    pub param: Bytes,
    pub data: Bytes,
}

impl Message {
    pub fn new(header: Header, url: impl Into<String>) -> Self {
        Self {
            header,
            url: url.into(),
            param: Bytes::new(),
            data: Bytes::new(),
        }
    }

    pub fn with_param(mut self, param: Bytes) -> Self {
        self.param = param;
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    fn body_len(&self) -> usize {
        self.url.len() + self.param.len() + self.data.len()
    }

    /// Total on-wire length this message would occupy once padded, without
    /// encoding it. Used by callers to size a pooled buffer up front.
    pub fn encoded_len(&self) -> usize {
        let body = self.body_len();
        HEADER_LEN + body + pad_len(body)
    }

    /// Encode into `bytes`, which is cleared first. Fails with
    /// [`Error::TooLong`] without writing anything if the framed length
    /// exceeds `channel`'s limit.
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use vsoa_codec::channel::Channel;
    /// use vsoa_codec::message::{Header, Message, MessageType};
    ///
    /// let msg = Message::new(Header::new(MessageType::Rpc), "/hello");
    /// let mut buf = BytesMut::new();
    /// msg.encode(Channel::Normal, &mut buf).unwrap();
    ///
    /// let decoded = Message::decode(&buf, Channel::Normal).unwrap();
    /// assert_eq!(decoded.url, "/hello");
    /// ```
    pub fn encode(&self, channel: Channel, bytes: &mut BytesMut) -> Result<(), Error> {
        let body = self.body_len();
        let pad = pad_len(body);
        let total = HEADER_LEN + body + pad;
        if total > channel.max_len() {
            return Err(Error::TooLong);
        }

        bytes.clear();
        bytes.reserve(total);

        bytes.put_u8(MAGIC);
        bytes.put_u8(self.header.msg_type.into());

        let mut flags: u8 = 0;
        if self.header.reply {
            flags |= 0x1;
        }
        if self.header.valid_tun_id {
            flags |= 0x2;
        }
        if self.header.rpc_method == RpcMethod::Set {
            flags |= 0x4;
        }
        flags |= (pad as u8) << 6;
        bytes.put_u8(flags);

        bytes.put_u8(self.header.status.into());
        bytes.put_u32(self.header.seq);
        bytes.put_u16(self.header.tun_id);

        bytes.put_u16(self.url.len() as u16);
        bytes.put_u32(self.param.len() as u32);
        bytes.put_u32(self.data.len() as u32);

        bytes.put(self.url.as_bytes());
        bytes.put(self.param.clone());
        bytes.put(self.data.clone());
        bytes.put_bytes(0, pad);

        Ok(())
    }

    /// Read the header's length fields (and the pad count already recorded
    /// in its flags byte) to learn the total framed length, before the full
    /// body has necessarily arrived. `prefix` must hold at least
    /// [`HEADER_LEN`] bytes.
    pub fn peek_total_len(prefix: &[u8]) -> Result<usize, Error> {
        if prefix.len() < HEADER_LEN {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )));
        }

        if prefix[0] != MAGIC {
            return Err(Error::BadMagic);
        }

        let pad = (prefix[2] >> 6) as usize;
        let url_len = u16::from_be_bytes(prefix[10..12].try_into().unwrap()) as usize;
        let param_len = u32::from_be_bytes(prefix[12..16].try_into().unwrap()) as usize;
        let data_len = u32::from_be_bytes(prefix[16..20].try_into().unwrap()) as usize;

        Ok(HEADER_LEN + url_len + param_len + data_len + pad)
    }

    /// Decode a complete frame (exactly [`Message::peek_total_len`] bytes).
    pub fn decode(mut buf: &[u8], channel: Channel) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )));
        }

        if buf[0] != MAGIC {
            return Err(Error::BadMagic);
        }

        let msg_type = MessageType::try_from(buf[1])?;
        let flags = buf[2];
        let reply = flags & 0x1 != 0;
        let valid_tun_id = flags & 0x2 != 0;
        let rpc_method = if flags & 0x4 != 0 {
            RpcMethod::Set
        } else {
            RpcMethod::Get
        };
        let pad = (flags >> 6) as usize;
        let status = StatusType::try_from(buf[3])?;
        let seq = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let tun_id = u16::from_be_bytes(buf[8..10].try_into().unwrap());

        let url_len = u16::from_be_bytes(buf[10..12].try_into().unwrap()) as usize;
        let param_len = u32::from_be_bytes(buf[12..16].try_into().unwrap()) as usize;
        let data_len = u32::from_be_bytes(buf[16..20].try_into().unwrap()) as usize;

        let body = url_len + param_len + data_len;
        let total = HEADER_LEN + body + pad;

        if total % 4 != 0 {
            return Err(Error::UnPad);
        }

        if total > channel.max_len() {
            return Err(Error::TooLong);
        }

        if buf.len() < total {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )));
        }

        buf.advance(HEADER_LEN);

        let url = std::str::from_utf8(&buf[..url_len])?.to_owned();
        buf.advance(url_len);

        let param = Bytes::copy_from_slice(&buf[..param_len]);
        buf.advance(param_len);

        let data = Bytes::copy_from_slice(&buf[..data_len]);
        buf.advance(data_len);
        // remaining `pad` bytes are discarded along with whatever trails
        // `total` in the caller's buffer.

        Ok(Self {
            header: Header {
                msg_type,
                reply,
                valid_tun_id,
                rpc_method,
                status,
                seq,
                tun_id,
            },
            url,
            param,
            data,
        })
    }
}

/// Padding needed so that `HEADER_LEN + body` is a multiple of 4. Since
/// `HEADER_LEN` is itself a multiple of 4, this only depends on `body`.
///
/// ```
/// use vsoa_codec::message::pad_len;
///
/// assert_eq!(pad_len(0), 0);
/// assert_eq!(pad_len(4), 0);
/// assert_eq!(pad_len(5), 3);
/// assert_eq!(pad_len(6), 2);
/// ```
pub fn pad_len(body: usize) -> usize {
    let rem = body % 4;
    if rem == 0 { 0 } else { 4 - rem }
}
