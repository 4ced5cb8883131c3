//! Server-side building blocks for VSOA: the per-connection client table,
//! the URL router (RPC/Datagram/Subscribe resolution), and the publish
//! trigger type. The listener loop, TCP/UDP transports, and stream tunnel
//! live in the `vsoa-server` binary crate; this crate holds the pure,
//! transport-agnostic bookkeeping so it can be unit tested without sockets.

pub mod client;
pub mod publish;
pub mod router;

#[derive(Debug)]
pub enum Error {
    /// A URL was registered twice for the same route category.
    AlreadyRegistered,
    /// A handler argument was required but absent.
    NilHandler,
    /// `Publish`/`QuickPublish` was given neither a `Timer` nor an `External`
    /// trigger.
    WrongPublishTrigger,
    /// `TriggerPublisher` was called against a `Timer`-triggered path.
    NotRawPublishUrl,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
