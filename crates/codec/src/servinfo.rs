//! ServInfo handshake parameter payloads (§6).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The ServInfo request's Param: all fields are optional on the wire, any
/// omitted field decodes as its type default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServInfoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwd: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "pingInterval"
    )]
    pub ping_interval: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "pingTimeout"
    )]
    pub ping_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "pingLost")]
    pub ping_lost: Option<u32>,
}

impl ServInfoRequest {
    pub fn encode(&self) -> Result<Bytes, Error> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The ServInfo reply's Param. On the wire this is either `{"info":"…"}` or
/// a bare string; both forms must decode (§6). The server writes the bare
/// string form, matching the reference implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServInfoReply {
    pub info: String,
}

impl ServInfoReply {
    pub fn new(info: impl Into<String>) -> Self {
        Self { info: info.into() }
    }

    pub fn encode_as_string(&self) -> Bytes {
        Bytes::from(self.info.clone().into_bytes())
    }

    pub fn encode_as_json(&self) -> Result<Bytes, Error> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Try JSON first (`{"info": "..."}`), fall back to treating the whole
    /// payload as the raw server-name string.
    ///
    /// ```
    /// use vsoa_codec::servinfo::ServInfoReply;
    ///
    /// let raw = ServInfoReply::decode(b"golang VSOA server").unwrap();
    /// assert_eq!(raw.info, "golang VSOA server");
    ///
    /// let json = ServInfoReply::decode(br#"{"info":"rust VSOA server"}"#).unwrap();
    /// assert_eq!(json.info, "rust VSOA server");
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if let Ok(reply) = serde_json::from_slice::<Self>(bytes) {
            return Ok(reply);
        }

        Ok(Self::new(std::str::from_utf8(bytes)?.to_owned()))
    }
}
