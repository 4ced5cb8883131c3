//! ## VSOA client
//!
//! Dials a server's normal (TCP) and quick (UDP) channels as one session,
//! multiplexes `Rpc`/`Datagram`/`Subscribe` calls over them with a
//! sequence-keyed pending map, and dispatches `Publish` pushes through a
//! subscription table plus an optional rate-limiting regulator. See
//! [`Session::connect`] for the entry point.

pub mod dispatcher;
pub mod error;
mod input;
mod ping;
pub mod position;
pub mod regulator;
mod session;
pub mod stream;

pub use dispatcher::{Call, Done};
pub use error::Error;
pub use regulator::SlotHandler;
pub use session::{Client, Config, OnConnectHook, Session, SubscribeHandler, Target};
