//! Position directory, server half (§4.8): an in-memory, append-on-unique-
//! name table of `{name, domain, addr, port, security}` entries, served
//! over a single UDP socket. Entries are populated by direct calls (§
//! `add`/`remove`), mirroring the original implementation where the
//! directory's list is a plain in-process data structure and lookup
//! requests are the only thing that travels over the wire.

use std::{net::SocketAddr, sync::Arc};

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use vsoa_codec::position::{LookUpRequest, Position};

#[derive(Default)]
pub struct PositionDirectory {
    entries: RwLock<Vec<Position>>,
}

impl PositionDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add or, if `name` is already registered, replace an entry. Silently
    /// ignored if `position.ip` would be a syntactically invalid address —
    /// unrepresentable here since [`Position::ip`] is already a parsed
    /// `IpAddr`, so this is really just the replace-in-place rule.
    pub fn add(&self, position: Position) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|p| p.name == position.name) {
            *existing = position;
        } else {
            entries.push(position);
        }
    }

    pub fn remove(&self, name: &str) {
        self.entries.write().retain(|p| p.name != name);
    }

    pub fn lookup(&self, name: &str) -> Option<Position> {
        self.entries.read().iter().find(|p| p.name == name).cloned()
    }

    /// Serve lookups on `bind` until the socket errors fatally. A
    /// malformed datagram is logged and skipped, not fatal to the listener
    /// (§9's general "don't kill the whole loop on one bad packet" stance,
    /// applied here to the directory too).
    pub async fn serve(self: Arc<Self>, bind: SocketAddr) -> std::io::Result<()> {
        let socket = UdpSocket::bind(bind).await?;
        let mut buf = [0u8; 1024];

        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    log::warn!("position directory recv error: {err}");
                    continue;
                }
            };

            let request: LookUpRequest = match serde_json::from_slice(&buf[..len]) {
                Ok(req) => req,
                Err(err) => {
                    log::debug!("position directory ignoring malformed request from {peer}: {err}");
                    continue;
                }
            };

            if let Some(position) = self.lookup(&request.name) {
                if let Ok(response) = serde_json::to_vec(&position) {
                    if let Err(err) = socket.send_to(&response, peer).await {
                        log::warn!("position directory reply to {peer} failed: {err}");
                    }
                }
            }
            // No entry: silently dropped, per §4.8 (the client times out).
        }
    }
}
