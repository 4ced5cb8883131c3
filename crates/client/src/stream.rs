//! Stream tunnel client side (§4.7): dial the server's advertised ephemeral
//! port on the same host as the session, for opaque bidirectional transfer.

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::Error;

/// Open a tunnel to `(session_host, tun_id)`. The returned stream carries
/// whatever bytes the RPC handler that produced `tun_id` promised — the
/// protocol itself does not frame it.
pub async fn dial(session_host: std::net::IpAddr, tun_id: u16) -> Result<TcpStream, Error> {
    let addr = SocketAddr::new(session_host, tun_id);
    Ok(TcpStream::connect(addr).await?)
}
