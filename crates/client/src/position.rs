//! Position directory client (§4.8): resolve a logical server name to a
//! network address over UDP, with a 500 ms timeout.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use vsoa_codec::position::{LookUpRequest, Position};

use crate::Error;

const LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Ask `directory` for `name`; `ErrLookUpTimeOut` if nothing comes back in
/// time, `ErrServerNotFound` if the reply names a different server.
pub async fn look_up(directory: SocketAddr, name: &str) -> Result<Position, Error> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(directory).await?;

    let request = serde_json::to_vec(&LookUpRequest {
        name: name.to_string(),
    })
    .map_err(vsoa_codec::Error::from)?;
    socket.send(&request).await?;

    let mut buf = [0u8; 4096];
    let len = tokio::time::timeout(LOOKUP_TIMEOUT, socket.recv(&mut buf))
        .await
        .map_err(|_| Error::LookUpTimeOut)??;

    let position: Position =
        serde_json::from_slice(&buf[..len]).map_err(vsoa_codec::Error::from)?;

    if position.name != name {
        return Err(Error::ServerNotFound);
    }

    Ok(position)
}
