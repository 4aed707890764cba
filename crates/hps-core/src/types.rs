use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = f64;

// ── ContentHash ──────────────────────────────────────────────────────────────

/// 32-byte content identifier: SHA-256 of the framed blob (header + payload).
/// Rendered as lowercase hex everywhere (wire, database, filenames).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::HpsError> {
        let bytes = hex::decode(s)
            .map_err(|_| crate::HpsError::InvalidArgument(format!("invalid content hash: {s}")))?;
        if bytes.len() != 32 {
            return Err(crate::HpsError::InvalidArgument(format!(
                "content hash must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}…)", &self.to_hex()[..16])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ContentHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ── PoW actions ──────────────────────────────────────────────────────────────

/// The four server operations gated behind a proof-of-work challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowAction {
    Login,
    Upload,
    Dns,
    Report,
}

impl PowAction {
    /// Wire name used in `request_pow_challenge.action_type`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            PowAction::Login => "login",
            PowAction::Upload => "upload",
            PowAction::Dns => "dns",
            PowAction::Report => "report",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "login" => Some(PowAction::Login),
            "upload" => Some(PowAction::Upload),
            "dns" => Some(PowAction::Dns),
            "report" => Some(PowAction::Report),
            _ => None,
        }
    }
}

impl fmt::Display for PowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ── Content metadata ─────────────────────────────────────────────────────────

/// Metadata row stored alongside every cached blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMeta {
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub username: String,
    /// Base64 RSA-PSS signature over the raw payload (empty when unknown).
    pub signature: String,
    /// Base64 of the author's public-key PEM (empty when unknown).
    pub public_key: String,
    pub verified: bool,
}
