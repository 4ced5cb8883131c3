use vsoa_codec::message::StatusType;

#[derive(Debug)]
pub enum Error {
    /// The session is closed or closing; no further calls can be issued.
    Shutdown,
    /// An I/O error tore down the connection while a call was pending.
    UnexpectedEof,
    /// Subscribe/Unsubscribe/RPC attempted before a successful ServInfo
    /// round-trip.
    UnAuthed,
    /// A PingEcho round-trip timed out.
    PingEcho,
    /// `Connect` used the `VSOA_URL` scheme and the position directory
    /// didn't answer within 500 ms.
    LookUpTimeOut,
    /// The position directory replied, but not about the name we asked for.
    ServerNotFound,
    /// A non-`Success` status came back on a reply.
    Status(StatusType),
    Codec(vsoa_codec::Error),
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Status(status) => write!(f, "{}", status.as_str()),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<vsoa_codec::Error> for Error {
    fn from(value: vsoa_codec::Error) -> Self {
        Self::Codec(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
