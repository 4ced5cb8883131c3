//! Position directory wire payloads (§4.8, §6): a UDP JSON name service
//! resolving a logical server name to a network address.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// `{"name":"…"}` — sent by a client looking up a logical server name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookUpRequest {
    pub name: String,
}

/// `{"name","domain","addr","port","security"}` — a directory entry, both
/// as registered by a server and as returned to a looking-up client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(rename = "addr")]
    pub ip: IpAddr,
    pub port: u16,
    #[serde(default)]
    pub security: bool,
}
