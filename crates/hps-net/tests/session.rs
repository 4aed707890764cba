//! End-to-end scenarios against an in-process mock server.
//!
//! The mock speaks the wire protocol over a local WebSocket: it signs real
//! auth challenges, hands out easy PoW targets, and stores published blobs
//! and name records in memory.
//!
//! Run with:
//!   cargo test -p hps-net --test session

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use hps_core::{frame_blob, parse_framed, HpsError};
use hps_crypto::{sha256_hex, verify_pow, verify_with_pem, KeyStore};
use hps_net::event::Envelope;
use hps_net::{Client, ReactorConfig, UploadRequest};
use hps_store::{ContentStore, Db};

// RSA-4096 generation is slow; share one keypair per role across all tests.
fn client_keys() -> &'static KeyStore {
    static KS: OnceLock<KeyStore> = OnceLock::new();
    KS.get_or_init(|| KeyStore::generate().expect("generate client keypair"))
}

fn server_keys() -> &'static KeyStore {
    static KS: OnceLock<KeyStore> = OnceLock::new();
    KS.get_or_init(|| KeyStore::generate().expect("generate server keypair"))
}

const POW_BITS: u32 = 8;
const POW_CHALLENGE: &[u8] = b"mock-challenge";

// ── Mock server ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ServerState {
    tamper_signature: bool,
    /// Event names in arrival order.
    received: Mutex<Vec<String>>,
    /// content_hash → publish_content payload.
    published: Mutex<HashMap<String, serde_json::Value>>,
    /// domain → (content_hash, username).
    dns: Mutex<HashMap<String, (String, String)>>,
    reports: Mutex<u32>,
}

impl ServerState {
    fn events(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

async fn start_mock(state: Arc<ServerState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let Ok(envelope) = Envelope::from_text(&text) else { continue };
                    state.received.lock().unwrap().push(envelope.event.clone());
                    for reply in respond(&envelope, &state) {
                        let text = reply.to_text().unwrap();
                        if ws.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    format!("http://{addr}")
}

fn respond(envelope: &Envelope, state: &ServerState) -> Vec<Envelope> {
    let data = &envelope.data;
    match envelope.event.as_str() {
        "request_server_auth_challenge" => {
            let challenge = "c1";
            let mut signature = server_keys().sign(challenge.as_bytes()).unwrap();
            if state.tamper_signature {
                signature[0] ^= 0x01;
            }
            vec![Envelope::new(
                "server_auth_challenge",
                json!({
                    "challenge": challenge,
                    "server_public_key": B64.encode(server_keys().public_key_pem()),
                    "signature": B64.encode(signature),
                }),
            )
            .unwrap()]
        }

        "verify_server_auth_response" => {
            let challenge = data["client_challenge"].as_str().unwrap_or_default();
            let signature = B64
                .decode(data["client_signature"].as_str().unwrap_or_default())
                .unwrap_or_default();
            let pem = B64
                .decode(data["client_public_key"].as_str().unwrap_or_default())
                .unwrap_or_default();
            let ok = verify_with_pem(&pem, challenge.as_bytes(), &signature).is_ok();
            vec![Envelope::new("server_auth_result", json!({ "success": ok })).unwrap()]
        }

        "request_pow_challenge" => {
            let action = data["action_type"].as_str().unwrap_or("login");
            vec![Envelope::new(
                "pow_challenge",
                json!({
                    "challenge": B64.encode(POW_CHALLENGE),
                    "target_bits": POW_BITS,
                    "target_seconds": 5.0,
                    "action_type": action,
                }),
            )
            .unwrap()]
        }

        "authenticate" => {
            let nonce: u64 = data["pow_nonce"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or(u64::MAX);
            let challenge = data["client_challenge"].as_str().unwrap_or_default();
            let signature = B64
                .decode(data["client_challenge_signature"].as_str().unwrap_or_default())
                .unwrap_or_default();
            let pem = B64
                .decode(data["public_key"].as_str().unwrap_or_default())
                .unwrap_or_default();
            let ok = verify_pow(POW_CHALLENGE, nonce, POW_BITS)
                && verify_with_pem(&pem, challenge.as_bytes(), &signature).is_ok();
            let username = data["username"].as_str().unwrap_or_default();
            let reputation = if username == "lowrep" { 19 } else { 100 };
            vec![Envelope::new(
                "authentication_result",
                json!({
                    "success": ok,
                    "username": username,
                    "reputation": reputation,
                    "error": if ok { serde_json::Value::Null } else { json!("bad credentials") },
                }),
            )
            .unwrap()]
        }

        "join_network" | "sync_client_files" => vec![],

        "publish_content" => {
            let hash = data["content_hash"].as_str().unwrap_or_default().to_string();
            state.published.lock().unwrap().insert(hash.clone(), data.clone());
            vec![Envelope::new(
                "publish_result",
                json!({ "success": true, "content_hash": hash }),
            )
            .unwrap()]
        }

        "request_content" => {
            let hash = data["content_hash"].as_str().unwrap_or_default();
            let reply = match state.published.lock().unwrap().get(hash) {
                Some(stored) => json!({
                    "content": stored["content_b64"],
                    "title": stored["title"],
                    "description": stored["description"],
                    "mime_type": stored["mime_type"],
                    "username": "alice",
                    "signature": stored["signature"],
                    "public_key": stored["public_key"],
                    "verified": true,
                    "content_hash": hash,
                }),
                None => json!({ "error": "content not found" }),
            };
            vec![Envelope::new("content_response", reply).unwrap()]
        }

        "register_dns" => {
            let domain = data["domain"].as_str().unwrap_or_default().to_string();
            // The binding lives inside the signed DDNS document.
            let doc = B64
                .decode(data["ddns_content"].as_str().unwrap_or_default())
                .unwrap_or_default();
            let text = String::from_utf8_lossy(&doc).into_owned();
            let hash = text
                .split(" = ")
                .nth(1)
                .and_then(|rest| rest.split("### :END DNS").next())
                .unwrap_or_default()
                .to_string();
            state
                .dns
                .lock()
                .unwrap()
                .insert(domain.clone(), (hash, "alice".into()));
            vec![Envelope::new("dns_result", json!({ "success": true, "domain": domain })).unwrap()]
        }

        "resolve_dns" => {
            let domain = data["domain"].as_str().unwrap_or_default();
            let reply = match state.dns.lock().unwrap().get(domain) {
                Some((hash, user)) => json!({
                    "success": true,
                    "domain": domain,
                    "content_hash": hash,
                    "username": user,
                    "verified": true,
                }),
                None => json!({ "success": false, "error": "domain not found" }),
            };
            vec![Envelope::new("dns_resolution", reply).unwrap()]
        }

        "search_content" => {
            let query = data["query"].as_str().unwrap_or_default().to_lowercase();
            let results: Vec<serde_json::Value> = state
                .published
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, p)| {
                    p["title"].as_str().unwrap_or_default().to_lowercase().contains(&query)
                })
                .map(|(hash, p)| {
                    json!({
                        "content_hash": hash,
                        "title": p["title"],
                        "username": "alice",
                        "mime_type": p["mime_type"],
                        "verified": true,
                        "reputation": 100,
                    })
                })
                .collect();
            vec![Envelope::new("search_results", json!({ "results": results })).unwrap()]
        }

        "report_content" => {
            *state.reports.lock().unwrap() += 1;
            vec![Envelope::new("report_result", json!({ "success": true })).unwrap()]
        }

        "get_network_state" => {
            let total = state.published.lock().unwrap().len();
            vec![Envelope::new(
                "network_state",
                json!({
                    "online_nodes": 1,
                    "total_content": total,
                    "total_dns": state.dns.lock().unwrap().len(),
                    "node_types": { "client": 1 },
                }),
            )
            .unwrap()]
        }

        _ => vec![],
    }
}

// ── Client stack ──────────────────────────────────────────────────────────────

struct TestClient {
    _dir: tempfile::TempDir,
    client: Client,
    db: Arc<Db>,
    store: Arc<ContentStore>,
}

async fn test_client() -> TestClient {
    let dir = tempfile::tempdir().unwrap();
    // Pre-seed the identity so the reactor does not generate a key per test.
    client_keys().save(dir.path()).unwrap();
    let keys = Arc::new(RwLock::new(KeyStore::load_or_generate(dir.path()).unwrap()));
    let db = Arc::new(Db::open(dir.path().join("hps_cli.db")).unwrap());
    let store = Arc::new(ContentStore::open(dir.path()).unwrap());
    let client = hps_net::spawn(
        ReactorConfig {
            data_dir: dir.path().to_path_buf(),
            tls_no_verify: false,
            auto_reconnect: false,
        },
        Arc::clone(&db),
        Arc::clone(&store),
        keys,
    );
    TestClient { _dir: dir, client, db, store }
}

async fn login(tc: &TestClient, addr: &str) {
    let outcome = tc.client.login(addr, "alice", "secret").await.expect("login succeeds");
    assert_eq!(outcome.username, "alice");
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_happy_path() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;

    let outcome = tc.client.login(&addr, "alice", "secret").await.expect("login succeeds");
    assert_eq!(outcome.username, "alice");
    assert_eq!(outcome.reputation, 100);

    let snap = tc.client.snapshot().await.unwrap();
    assert!(snap.connected);
    assert_eq!(snap.current_user.as_deref(), Some("alice"));
    assert_eq!(snap.reputation, 100);
    assert_eq!(snap.stats.pow_solved, 1);

    // Post-login housekeeping reached the server.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let events = state.events();
    assert!(events.iter().any(|e| e == "join_network"));
    assert!(events.iter().any(|e| e == "sync_client_files"));

    tc.client.shutdown().await;
}

#[tokio::test]
async fn tampered_server_signature_aborts_session() {
    let state = Arc::new(ServerState { tamper_signature: true, ..Default::default() });
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;

    let err = tc.client.login(&addr, "alice", "secret").await.unwrap_err();
    assert!(matches!(err, HpsError::InvalidSignature), "got {err:?}");

    // Nothing after the challenge request may reach the wire.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let events = state.events();
    assert_eq!(events, vec!["request_server_auth_challenge".to_string()]);

    let snap = tc.client.snapshot().await.unwrap();
    assert!(snap.current_user.is_none());

    tc.client.shutdown().await;
}

#[tokio::test]
async fn upload_download_round_trip() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    let payload = b"hello".to_vec();
    let outcome = tc
        .client
        .upload(UploadRequest {
            payload: payload.clone(),
            title: "t".into(),
            description: "".into(),
            mime_type: "text/plain".into(),
        })
        .await
        .expect("upload succeeds");

    // The hash covers the framed blob, not the bare payload.
    let framed = frame_blob("alice", client_keys().public_key_pem(), &payload);
    assert_eq!(outcome.content_hash, sha256_hex(&framed));

    let downloaded = tc.client.download(&outcome.content_hash).await.expect("download succeeds");
    assert!(downloaded.integrity_ok);
    assert!(downloaded.verified);
    assert_eq!(downloaded.content, framed);
    assert_eq!(downloaded.title, "t");

    // The payload and author signature survive the round trip.
    let parsed = parse_framed(&downloaded.content).expect("framed blob parses");
    assert_eq!(parsed.payload, payload);
    assert_eq!(parsed.username, "alice");

    let row = tc.db.get_content(&outcome.content_hash).unwrap().expect("row cached");
    let signature = B64.decode(&row.meta.signature).unwrap();
    verify_with_pem(client_keys().public_key_pem(), &payload, &signature)
        .expect("author signature verifies");

    let report = tc.store.verify(&outcome.content_hash, &row.meta).unwrap();
    assert!(report.integrity_ok);
    assert!(report.signature_ok);

    tc.client.shutdown().await;
}

#[tokio::test]
async fn dns_register_and_resolve() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    let hash = sha256_hex(b"some blob");
    let domain = tc.client.dns_register("example", &hash).await.expect("registration succeeds");
    assert_eq!(domain, "example");

    let resolved = tc.client.dns_resolve("example").await.expect("resolution succeeds");
    assert_eq!(resolved.content_hash, hash);
    assert_eq!(resolved.username, "alice");
    assert!(resolved.verified);

    let record = tc.db.get_dns_record("example").unwrap().expect("record cached");
    assert_eq!(record.content_hash, hash);
    assert_eq!(record.username, "alice");

    tc.client.shutdown().await;
}

#[tokio::test]
async fn duplicate_report_rejected_locally() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    let hash = sha256_hex(b"offensive blob");
    tc.client.report(&hash, "bob").await.expect("first report succeeds");

    let err = tc.client.report(&hash, "bob").await.unwrap_err();
    assert!(matches!(err, HpsError::InvalidArgument(_)), "got {err:?}");

    // The second invocation never reached the wire.
    assert_eq!(*state.reports.lock().unwrap(), 1);
    let report_events = state
        .events()
        .iter()
        .filter(|e| *e == "report_content")
        .count();
    assert_eq!(report_events, 1);

    tc.client.shutdown().await;
}

#[tokio::test]
async fn self_report_rejected() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    let err = tc.client.report(&sha256_hex(b"x"), "alice").await.unwrap_err();
    assert!(matches!(err, HpsError::InvalidArgument(_)));
    assert_eq!(*state.reports.lock().unwrap(), 0);

    tc.client.shutdown().await;
}

#[tokio::test]
async fn low_reputation_blocks_report() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;

    let outcome = tc.client.login(&addr, "lowrep", "secret").await.unwrap();
    assert_eq!(outcome.reputation, 19);

    let err = tc.client.report(&sha256_hex(b"blob"), "bob").await.unwrap_err();
    assert!(matches!(err, HpsError::InvalidArgument(_)));
    assert_eq!(*state.reports.lock().unwrap(), 0);

    tc.client.shutdown().await;
}

#[tokio::test]
async fn oversized_upload_rejected() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    // One byte over the 100 MiB payload cap fails locally, before any PoW.
    let err = tc
        .client
        .upload(UploadRequest {
            payload: vec![0u8; 100 * 1024 * 1024 + 1],
            title: "big".into(),
            description: "".into(),
            mime_type: "application/octet-stream".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HpsError::InvalidArgument(_)));
    assert!(!state.events().iter().any(|e| e == "publish_content"));

    tc.client.shutdown().await;
}

#[tokio::test]
async fn gated_verbs_require_login() {
    let tc = test_client().await;
    let err = tc
        .client
        .upload(UploadRequest {
            payload: b"data".to_vec(),
            title: "t".into(),
            description: "".into(),
            mime_type: "text/plain".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HpsError::InvalidArgument(_)));
    tc.client.shutdown().await;
}

#[tokio::test]
async fn search_and_network_state() {
    let state = Arc::new(ServerState::default());
    let addr = start_mock(Arc::clone(&state)).await;
    let tc = test_client().await;
    login(&tc, &addr).await;

    tc.client
        .upload(UploadRequest {
            payload: b"searchable".to_vec(),
            title: "findme".into(),
            description: "".into(),
            mime_type: "text/plain".into(),
        })
        .await
        .unwrap();

    let results = tc.client.search("findme", "", "reputation").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "findme");

    let empty = tc.client.search("nothing-matches", "", "reputation").await.unwrap();
    assert!(empty.is_empty());

    let info = tc.client.network_state().await.unwrap();
    assert_eq!(info.online_nodes, 1);
    assert_eq!(info.total_content, 1);

    tc.client.shutdown().await;
}
