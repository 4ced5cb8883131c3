//! Stream tunnel, server side (§4.7): an RPC handler binds an ephemeral
//! listener, puts its port in the reply's `tunId`, and the caller awaits
//! the single inbound connection in the background while the RPC reply
//! goes out over the normal channel. One tunnel per request; the listener
//! accepts exactly one connection and then closes.

use std::{io, net::IpAddr};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Bind port 0 on `host` and return the bound port plus the still-open
/// listener, ready to hand to [`accept_once`].
pub async fn bind_ephemeral(host: IpAddr) -> io::Result<(u16, TcpListener)> {
    let listener = TcpListener::bind((host, 0)).await?;
    let port = listener.local_addr()?.port();
    Ok((port, listener))
}

/// Accept the tunnel's one connection; the listener is dropped (and so
/// closed) as soon as this resolves, satisfying "one tunnel per request".
pub async fn accept_once(listener: TcpListener) -> io::Result<TcpStream> {
    let (stream, _) = listener.accept().await?;
    Ok(stream)
}

/// Run a tunnel once its connection lands: `push` streams out to the
/// client, `pull` receives whatever the client sends back. Both copies run
/// independently; the tunnel closes once both finish (§4.7).
pub async fn run_tunnel<R, W>(tunnel: TcpStream, mut push: R, mut pull: W) -> io::Result<(u64, u64)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut tunnel_read, mut tunnel_write) = tunnel.into_split();
    let to_client = tokio::io::copy(&mut push, &mut tunnel_write);
    let from_client = tokio::io::copy(&mut tunnel_read, &mut pull);
    let (sent, received) = tokio::try_join!(to_client, from_client)?;
    tunnel_write.shutdown().await.ok();
    Ok((sent, received))
}
