//! Wire events.
//!
//! Every frame on the socket is a JSON text message of the form
//! `{"event": <name>, "data": <object>}`. Binary fields (keys, signatures,
//! content) are base64 strings; hashes are lowercase hex; PoW nonces travel
//! as decimal strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use hps_core::HpsError;

/// Event names, client → server.
pub mod client {
    pub const REQUEST_SERVER_AUTH_CHALLENGE: &str = "request_server_auth_challenge";
    pub const VERIFY_SERVER_AUTH_RESPONSE: &str = "verify_server_auth_response";
    pub const REQUEST_POW_CHALLENGE: &str = "request_pow_challenge";
    pub const AUTHENTICATE: &str = "authenticate";
    pub const JOIN_NETWORK: &str = "join_network";
    pub const SYNC_CLIENT_FILES: &str = "sync_client_files";
    pub const PUBLISH_CONTENT: &str = "publish_content";
    pub const REQUEST_CONTENT: &str = "request_content";
    pub const REGISTER_DNS: &str = "register_dns";
    pub const RESOLVE_DNS: &str = "resolve_dns";
    pub const SEARCH_CONTENT: &str = "search_content";
    pub const REPORT_CONTENT: &str = "report_content";
    pub const GET_NETWORK_STATE: &str = "get_network_state";
}

/// Event names, server → client.
pub mod server {
    pub const SERVER_AUTH_CHALLENGE: &str = "server_auth_challenge";
    pub const SERVER_AUTH_RESULT: &str = "server_auth_result";
    pub const POW_CHALLENGE: &str = "pow_challenge";
    pub const AUTHENTICATION_RESULT: &str = "authentication_result";
    pub const CONTENT_RESPONSE: &str = "content_response";
    pub const PUBLISH_RESULT: &str = "publish_result";
    pub const DNS_RESULT: &str = "dns_result";
    pub const DNS_RESOLUTION: &str = "dns_resolution";
    pub const SEARCH_RESULTS: &str = "search_results";
    pub const NETWORK_STATE: &str = "network_state";
    pub const REPORT_RESULT: &str = "report_result";
}

// ── Envelope ─────────────────────────────────────────────────────────────────

/// One socket frame: a named event with a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Envelope {
    pub fn new(event: &str, data: impl Serialize) -> Result<Self, HpsError> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn empty(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: serde_json::json!({}),
        }
    }

    pub fn to_text(&self) -> Result<String, HpsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, HpsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode the payload into a typed struct.
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> Result<T, HpsError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

// ── Client → server payloads ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPowChallenge {
    pub client_identifier: String,
    pub action_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyServerAuthResponse {
    pub client_challenge: String,
    pub client_signature: String,
    pub client_public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authenticate {
    pub username: String,
    pub password_hash: String,
    pub public_key: String,
    pub node_type: String,
    pub client_identifier: String,
    pub pow_nonce: String,
    pub hashrate_observed: f64,
    pub client_challenge_signature: String,
    pub client_challenge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinNetwork {
    pub node_id: String,
    pub address: String,
    pub public_key: String,
    pub username: String,
    pub node_type: String,
    pub client_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFile {
    pub content_hash: String,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncClientFiles {
    pub files: Vec<SyncFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishContent {
    pub content_hash: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub size: u64,
    pub signature: String,
    pub public_key: String,
    pub content_b64: String,
    pub pow_nonce: String,
    pub hashrate_observed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContent {
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDns {
    pub domain: String,
    pub ddns_content: String,
    pub signature: String,
    pub public_key: String,
    pub pow_nonce: String,
    pub hashrate_observed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveDns {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchContent {
    pub query: String,
    pub limit: u32,
    pub content_type: String,
    pub sort_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContent {
    pub content_hash: String,
    pub reported_user: String,
    pub reporter: String,
    pub pow_nonce: String,
    pub hashrate_observed: f64,
}

// ── Server → client payloads ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuthChallenge {
    pub challenge: String,
    pub server_public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuthResult {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
}

/// `pow_challenge` doubles as the ban channel: a payload carrying `error`
/// (and optionally `blocked_until`) means the request was rate-limited.
#[derive(Debug, Clone, Deserialize)]
pub struct PowChallenge {
    pub error: Option<String>,
    pub blocked_until: Option<f64>,
    pub challenge: Option<String>,
    pub target_bits: Option<u32>,
    pub target_seconds: Option<f64>,
    pub action_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticationResult {
    #[serde(default)]
    pub success: bool,
    pub username: Option<String>,
    pub reputation: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentResponse {
    pub error: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub content_hash: String,
    pub reputation: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishResult {
    #[serde(default)]
    pub success: bool,
    pub content_hash: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsResult {
    #[serde(default)]
    pub success: bool,
    pub domain: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsResolution {
    #[serde(default)]
    pub success: bool,
    pub domain: Option<String>,
    pub content_hash: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub reputation: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkNode {
    pub node_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkState {
    pub error: Option<String>,
    #[serde(default)]
    pub online_nodes: u64,
    #[serde(default)]
    pub total_content: u64,
    #[serde(default)]
    pub total_dns: u64,
    #[serde(default)]
    pub node_types: HashMap<String, u64>,
    #[serde(default)]
    pub nodes: Vec<NetworkNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportResult {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trip() {
        let env = Envelope::new(
            client::REQUEST_POW_CHALLENGE,
            RequestPowChallenge {
                client_identifier: "abc".into(),
                action_type: "login".into(),
            },
        )
        .unwrap();
        let text = env.to_text().unwrap();
        let back = Envelope::from_text(&text).unwrap();
        assert_eq!(back.event, "request_pow_challenge");
        let payload: RequestPowChallenge = back.parse().unwrap();
        assert_eq!(payload.action_type, "login");
    }

    #[test]
    fn pow_challenge_error_form() {
        let env = Envelope::from_text(
            r#"{"event":"pow_challenge","data":{"error":"rate limited","blocked_until":123.5}}"#,
        )
        .unwrap();
        let payload: PowChallenge = env.parse().unwrap();
        assert_eq!(payload.error.as_deref(), Some("rate limited"));
        assert_eq!(payload.blocked_until, Some(123.5));
        assert!(payload.challenge.is_none());
    }

    #[test]
    fn missing_data_defaults_to_object() {
        let env = Envelope::from_text(r#"{"event":"server_auth_result"}"#).unwrap();
        let payload: ServerAuthResult = env.parse().unwrap();
        assert!(!payload.success);
    }
}
