//! Session state: the identity of this running instance plus everything the
//! mutual-auth handshake accumulates (pinned server keys, challenges, the
//! authenticated user, reputation, ban state).

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use zeroize::Zeroizing;

use hps_core::DEFAULT_REPUTATION;
use hps_crypto::sha256_hex;

/// Stable per-machine string mixed into the client identifier. Hardware
/// identity where available, hostname otherwise.
fn machine_fingerprint() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let id = id.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".into())
}

#[derive(Debug)]
pub struct Session {
    /// Random UUID identifying this process.
    pub session_id: String,
    /// First 32 hex chars of SHA-256(session_id).
    pub node_id: String,
    /// SHA-256(SHA-256(machine_fingerprint) ++ session_id), sent on every PoW
    /// and join request.
    pub client_identifier: String,

    pub current_server: Option<String>,
    pub current_user: Option<String>,
    pub username: Option<String>,
    /// SHA-256 hex of the login password; wiped on drop and on logout. Held
    /// only between `login` and the `authenticate` emit.
    pub password_hash: Option<Zeroizing<String>>,
    pub reputation: i64,

    /// Server public keys (base64 PEM) pinned per server address for the
    /// lifetime of the process.
    pub server_public_keys: HashMap<String, String>,
    /// Our outstanding challenge to the server, signed again inside
    /// `authenticate`.
    pub client_auth_challenge: Option<String>,

    pub banned_until: Option<f64>,
    pub ban_reason: String,

    /// Set between `login` and `authentication_result`; gates the automatic
    /// `request_pow_challenge` after the server-auth phase.
    pub pending_login: bool,
}

impl Session {
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let node_id = sha256_hex(session_id.as_bytes())[..32].to_string();
        let machine_id = sha256_hex(machine_fingerprint().as_bytes());
        let client_identifier = sha256_hex(format!("{machine_id}{session_id}").as_bytes());

        Self {
            session_id,
            node_id,
            client_identifier,
            current_server: None,
            current_user: None,
            username: None,
            password_hash: None,
            reputation: DEFAULT_REPUTATION,
            server_public_keys: HashMap::new(),
            client_auth_challenge: None,
            banned_until: None,
            ban_reason: String::new(),
            pending_login: false,
        }
    }

    /// The client's side of the mutual-auth challenge: 32 random bytes,
    /// URL-safe base64 without padding.
    pub fn generate_client_challenge() -> String {
        let bytes: [u8; 32] = rand::random();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    /// Remaining ban, if any: `(seconds_left, reason)`.
    pub fn active_ban(&self, now: f64) -> Option<(f64, String)> {
        match self.banned_until {
            Some(until) if until > now => Some((until - now, self.ban_reason.clone())),
            _ => None,
        }
    }

    pub fn set_ban(&mut self, until: f64, reason: &str) {
        self.banned_until = Some(until);
        self.ban_reason = reason.to_string();
    }

    /// Clear the user-auth side of the session (logout, fatal auth failure).
    /// Pinned server keys survive; they are per-process, not per-login.
    pub fn clear_auth(&mut self) {
        self.current_user = None;
        self.username = None;
        self.password_hash = None;
        self.client_auth_challenge = None;
        self.pending_login = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_derived() {
        let s = Session::new();
        assert_eq!(s.node_id.len(), 32);
        assert_eq!(s.client_identifier.len(), 64);
        assert_eq!(s.node_id, sha256_hex(s.session_id.as_bytes())[..32]);
    }

    #[test]
    fn sessions_are_distinct() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.client_identifier, b.client_identifier);
    }

    #[test]
    fn client_challenge_is_urlsafe() {
        let c = Session::generate_client_challenge();
        assert!(c.len() >= 42);
        assert!(c.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn ban_expiry() {
        let mut s = Session::new();
        s.set_ban(100.0, "rate limit exceeded");
        assert!(s.active_ban(50.0).is_some());
        assert!(s.active_ban(100.5).is_none());
    }

    #[test]
    fn clear_auth_keeps_pinned_keys() {
        let mut s = Session::new();
        s.current_user = Some("alice".into());
        s.server_public_keys.insert("http://a".into(), "key".into());
        s.clear_auth();
        assert!(!s.logged_in());
        assert_eq!(s.server_public_keys.len(), 1);
    }
}
