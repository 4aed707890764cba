//! Reactor: the single task that owns the server connection.
//!
//! Command handlers talk to it through a cloneable [`Client`] handle and
//! block on per-request oneshot reply channels; the reactor correlates each
//! inbound server event with the caller that is waiting for it. PoW-gated
//! verbs run a three-phase flow:
//!
//!   phase 1: emit `request_pow_challenge{action}`
//!   phase 2: on `pow_challenge`, mine on a blocking worker
//!   phase 3: emit the gated event with the solved nonce, await the
//!            verb's terminal event
//!
//! A pending context per action type holds the phase-3 payload in between;
//! at most one context per action type may exist at a time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use hps_core::{
    frame_blob, ddns_document, ContentMeta, HpsError, PowAction, GATED_TIMEOUT_SECS,
    MAX_UPLOAD_SIZE, SEARCH_LIMIT, SIMPLE_TIMEOUT_SECS,
};
use hps_crypto::{content_hash_of, sha256_hex, solve_challenge, verify_with_pem, KeyStore, PowSolution};
use hps_store::{disk_usage, ContentStore, Db, DnsRecordRow, NetworkNodeRow, SessionSnapshot, Stats};

use crate::event::{client as ev, server as sv, *};
use crate::session::Session;
use crate::transport::{self, TransportConfig, TransportEvent, TransportHandle};

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

// ── Outcome types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub username: String,
    pub reputation: i64,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub payload: Vec<u8>,
    pub title: String,
    pub description: String,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// The framed blob exactly as received (header + payload).
    pub content: Vec<u8>,
    pub content_hash: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub username: String,
    pub verified: bool,
    /// False when the recomputed hash differs from `content_hash`. The bytes
    /// are still delivered so the caller can decide what to do with them.
    pub integrity_ok: bool,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub domain: String,
    pub content_hash: String,
    pub username: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    pub online_nodes: u64,
    pub total_content: u64,
    pub total_dns: u64,
    pub node_types: HashMap<String, u64>,
}

/// Point-in-time view of the reactor's state, for `stats` and prompts.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub connected: bool,
    pub current_user: Option<String>,
    pub current_server: Option<String>,
    pub reputation: i64,
    pub session_id: String,
    pub node_id: String,
    pub client_identifier: String,
    pub stats: Stats,
    pub banned_until: Option<f64>,
    pub disk_used: u64,
}

// ── Command plumbing ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum GatedOutcome {
    Login(LoginOutcome),
    Upload(UploadOutcome),
    Dns { domain: String },
    Report,
}

#[derive(Debug)]
enum SimpleOutcome {
    Content(DownloadOutcome),
    Resolution(ResolveOutcome),
    Search(Vec<SearchResult>),
    Network(NetworkInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SimpleKind {
    Content,
    Resolution,
    Search,
    Network,
}

type GatedReply = oneshot::Sender<Result<GatedOutcome, HpsError>>;
type SimpleReply = oneshot::Sender<Result<SimpleOutcome, HpsError>>;

enum Command {
    Login { server: String, username: String, password: String, reply: GatedReply },
    Logout { reply: oneshot::Sender<Result<(), HpsError>> },
    Upload { req: UploadRequest, reply: GatedReply },
    DnsRegister { domain: String, content_hash: String, reply: GatedReply },
    Report { content_hash: String, reported_user: String, reply: GatedReply },
    Download { content_hash: String, reply: SimpleReply },
    DnsResolve { domain: String, reply: SimpleReply },
    Search { query: String, content_type: String, sort_by: String, reply: SimpleReply },
    NetworkState { reply: SimpleReply },
    SyncFiles { reply: oneshot::Sender<Result<(), HpsError>> },
    Snapshot { reply: oneshot::Sender<ClientSnapshot> },
    CancelGated(PowAction),
    CancelSimple(SimpleKind),
    Shutdown { reply: oneshot::Sender<()> },
}

// ── Client handle ────────────────────────────────────────────────────────────

/// Cloneable handle used by command handlers (REPL and controller bridge).
#[derive(Clone)]
pub struct Client {
    tx: mpsc::Sender<Command>,
}

impl Client {
    async fn gated(
        &self,
        action: PowAction,
        build: impl FnOnce(GatedReply) -> Command,
    ) -> Result<GatedOutcome, HpsError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| HpsError::NotConnected)?;
        match tokio::time::timeout(Duration::from_secs(GATED_TIMEOUT_SECS), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HpsError::RequestTimeout),
            Err(_) => {
                let _ = self.tx.send(Command::CancelGated(action)).await;
                Err(HpsError::RequestTimeout)
            }
        }
    }

    async fn simple(
        &self,
        kind: SimpleKind,
        build: impl FnOnce(SimpleReply) -> Command,
    ) -> Result<SimpleOutcome, HpsError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| HpsError::NotConnected)?;
        match tokio::time::timeout(Duration::from_secs(SIMPLE_TIMEOUT_SECS), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HpsError::RequestTimeout),
            Err(_) => {
                let _ = self.tx.send(Command::CancelSimple(kind)).await;
                Err(HpsError::RequestTimeout)
            }
        }
    }

    /// Connect to `server` and run the full mutual-auth + PoW login flow.
    pub async fn login(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, HpsError> {
        let outcome = self
            .gated(PowAction::Login, |reply| Command::Login {
                server: server.to_string(),
                username: username.to_string(),
                password: password.to_string(),
                reply,
            })
            .await?;
        match outcome {
            GatedOutcome::Login(o) => Ok(o),
            _ => Err(HpsError::ServerError("unexpected login reply".into())),
        }
    }

    pub async fn logout(&self) -> Result<(), HpsError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Logout { reply: tx })
            .await
            .map_err(|_| HpsError::NotConnected)?;
        rx.await.map_err(|_| HpsError::NotConnected)?
    }

    /// Publish a payload. Returns the content hash of the framed blob.
    pub async fn upload(&self, req: UploadRequest) -> Result<UploadOutcome, HpsError> {
        match self
            .gated(PowAction::Upload, |reply| Command::Upload { req, reply })
            .await?
        {
            GatedOutcome::Upload(o) => Ok(o),
            _ => Err(HpsError::ServerError("unexpected upload reply".into())),
        }
    }

    pub async fn dns_register(&self, domain: &str, content_hash: &str) -> Result<String, HpsError> {
        match self
            .gated(PowAction::Dns, |reply| Command::DnsRegister {
                domain: domain.to_string(),
                content_hash: content_hash.to_string(),
                reply,
            })
            .await?
        {
            GatedOutcome::Dns { domain } => Ok(domain),
            _ => Err(HpsError::ServerError("unexpected dns reply".into())),
        }
    }

    pub async fn report(&self, content_hash: &str, reported_user: &str) -> Result<(), HpsError> {
        match self
            .gated(PowAction::Report, |reply| Command::Report {
                content_hash: content_hash.to_string(),
                reported_user: reported_user.to_string(),
                reply,
            })
            .await?
        {
            GatedOutcome::Report => Ok(()),
            _ => Err(HpsError::ServerError("unexpected report reply".into())),
        }
    }

    pub async fn download(&self, content_hash: &str) -> Result<DownloadOutcome, HpsError> {
        match self
            .simple(SimpleKind::Content, |reply| Command::Download {
                content_hash: content_hash.to_string(),
                reply,
            })
            .await?
        {
            SimpleOutcome::Content(o) => Ok(o),
            _ => Err(HpsError::ServerError("unexpected content reply".into())),
        }
    }

    pub async fn dns_resolve(&self, domain: &str) -> Result<ResolveOutcome, HpsError> {
        match self
            .simple(SimpleKind::Resolution, |reply| Command::DnsResolve {
                domain: domain.to_string(),
                reply,
            })
            .await?
        {
            SimpleOutcome::Resolution(o) => Ok(o),
            _ => Err(HpsError::ServerError("unexpected resolution reply".into())),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        content_type: &str,
        sort_by: &str,
    ) -> Result<Vec<SearchResult>, HpsError> {
        match self
            .simple(SimpleKind::Search, |reply| Command::Search {
                query: query.to_string(),
                content_type: content_type.to_string(),
                sort_by: sort_by.to_string(),
                reply,
            })
            .await?
        {
            SimpleOutcome::Search(results) => Ok(results),
            _ => Err(HpsError::ServerError("unexpected search reply".into())),
        }
    }

    pub async fn network_state(&self) -> Result<NetworkInfo, HpsError> {
        match self
            .simple(SimpleKind::Network, |reply| Command::NetworkState { reply })
            .await?
        {
            SimpleOutcome::Network(info) => Ok(info),
            _ => Err(HpsError::ServerError("unexpected network reply".into())),
        }
    }

    /// Re-announce local blobs to the server (fire and forget).
    pub async fn sync_files(&self) -> Result<(), HpsError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::SyncFiles { reply: tx })
            .await
            .map_err(|_| HpsError::NotConnected)?;
        rx.await.map_err(|_| HpsError::NotConnected)?
    }

    pub async fn snapshot(&self) -> Result<ClientSnapshot, HpsError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply: tx })
            .await
            .map_err(|_| HpsError::NotConnected)?;
        rx.await.map_err(|_| HpsError::NotConnected)
    }

    /// Persist state and stop the reactor task.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

// ── Reactor ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub data_dir: PathBuf,
    pub tls_no_verify: bool,
    pub auto_reconnect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatedState {
    AwaitChallenge,
    Mining,
    AwaitTerminal,
}

enum GatedPayload {
    Login,
    Upload {
        content_hash: String,
        title: String,
        description: String,
        mime_type: String,
        size: u64,
        signature_b64: String,
        content_b64: String,
    },
    Dns {
        domain: String,
        ddns_b64: String,
        signature_b64: String,
    },
    Report {
        content_hash: String,
        reported_user: String,
    },
}

struct PendingGated {
    payload: GatedPayload,
    reply: GatedReply,
    cancel: Arc<AtomicBool>,
    state: GatedState,
}

struct MinerDone {
    action: PowAction,
    solution: Option<PowSolution>,
    error: Option<HpsError>,
}

/// Spawn the reactor task. Session state and stats are restored from the
/// database before the task starts.
pub fn spawn(
    config: ReactorConfig,
    db: Arc<Db>,
    store: Arc<ContentStore>,
    keys: Arc<RwLock<KeyStore>>,
) -> Client {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (miner_tx, miner_rx) = mpsc::channel(8);

    let mut session = Session::new();
    match db.load_session() {
        Ok(snap) => {
            session.current_user = snap.current_user;
            session.current_server = snap.current_server;
            session.username = snap.username;
            session.reputation = snap.reputation;
        }
        Err(e) => warn!(error = %e, "failed to restore session state"),
    }
    let stats = db.load_stats().unwrap_or_else(|e| {
        warn!(error = %e, "failed to restore stats");
        Stats::default()
    });

    let reactor = Reactor {
        config,
        db,
        store,
        keys,
        session,
        stats,
        transport: None,
        transport_rx: None,
        miner_tx,
        pending_gated: HashMap::new(),
        pending_simple: HashMap::new(),
    };
    tokio::spawn(reactor.run(cmd_rx, miner_rx));

    Client { tx: cmd_tx }
}

struct Reactor {
    config: ReactorConfig,
    db: Arc<Db>,
    store: Arc<ContentStore>,
    keys: Arc<RwLock<KeyStore>>,
    session: Session,
    stats: Stats,
    transport: Option<TransportHandle>,
    transport_rx: Option<mpsc::Receiver<TransportEvent>>,
    miner_tx: mpsc::Sender<MinerDone>,
    pending_gated: HashMap<PowAction, PendingGated>,
    pending_simple: HashMap<SimpleKind, SimpleReply>,
}

async fn recv_transport(
    rx: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Reactor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut miner_rx: mpsc::Receiver<MinerDone>,
    ) {
        loop {
            tokio::select! {
                maybe = cmd_rx.recv() => {
                    match maybe {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                Some(done) = miner_rx.recv() => self.handle_miner_done(done),

                maybe = recv_transport(&mut self.transport_rx) => {
                    match maybe {
                        Some(event) => self.handle_transport(event),
                        None => self.transport_rx = None,
                    }
                }
            }
        }
        self.persist();
        if let Some(t) = self.transport.take() {
            t.shutdown();
        }
        debug!("reactor stopped");
    }

    // ── Shared helpers ───────────────────────────────────────────────────────

    fn connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    fn emit(&self, event: &str, data: impl serde::Serialize) -> Result<(), HpsError> {
        let transport = self.transport.as_ref().ok_or(HpsError::NotConnected)?;
        transport.emit(Envelope::new(event, data)?)
    }

    fn persist(&self) {
        let snap = SessionSnapshot {
            current_user: self.session.current_user.clone(),
            current_server: self.session.current_server.clone(),
            username: self.session.username.clone(),
            reputation: self.session.reputation,
        };
        if let Err(e) = self.db.save_session(&snap) {
            warn!(error = %e, "failed to persist session state");
        }
        if let Err(e) = self.db.save_stats(&self.stats) {
            warn!(error = %e, "failed to persist stats");
        }
    }

    fn public_key_b64(&self) -> String {
        let keys = self.keys.read().expect("keystore lock poisoned");
        B64.encode(keys.public_key_pem())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, HpsError> {
        let keys = self.keys.read().expect("keystore lock poisoned");
        keys.sign(message)
    }

    /// Gate checks shared by every PoW verb except login.
    fn gated_preflight(&self, action: PowAction) -> Result<(), HpsError> {
        if !self.session.logged_in() {
            return Err(HpsError::InvalidArgument("not logged in".into()));
        }
        if !self.connected() {
            return Err(HpsError::NotConnected);
        }
        if let Some((left, reason)) = self.session.active_ban(now_secs()) {
            return Err(HpsError::Banned {
                until: self.session.banned_until.unwrap_or_default(),
                reason: format!("{reason} ({left:.0}s remaining)"),
            });
        }
        if self.pending_gated.contains_key(&action) {
            return Err(HpsError::InvalidArgument(format!(
                "a {action} request is already in flight"
            )));
        }
        Ok(())
    }

    fn request_pow(&mut self, action: PowAction, payload: GatedPayload, reply: GatedReply) {
        let request = RequestPowChallenge {
            client_identifier: self.session.client_identifier.clone(),
            action_type: action.wire_name().to_string(),
        };
        if let Err(e) = self.emit(ev::REQUEST_POW_CHALLENGE, request) {
            let _ = reply.send(Err(e));
            return;
        }
        self.pending_gated.insert(
            action,
            PendingGated {
                payload,
                reply,
                cancel: Arc::new(AtomicBool::new(false)),
                state: GatedState::AwaitChallenge,
            },
        );
    }

    fn fail_gated(&mut self, action: PowAction, err: HpsError) {
        if let Some(pending) = self.pending_gated.remove(&action) {
            pending.cancel.store(true, Ordering::Relaxed);
            let _ = pending.reply.send(Err(err));
        }
        if action == PowAction::Login {
            self.session.pending_login = false;
        }
    }

    fn fail_all_pending(&mut self, make_err: impl Fn() -> HpsError) {
        let actions: Vec<_> = self.pending_gated.keys().copied().collect();
        for action in actions {
            self.fail_gated(action, make_err());
        }
        let kinds: Vec<_> = self.pending_simple.keys().copied().collect();
        for kind in kinds {
            if let Some(reply) = self.pending_simple.remove(&kind) {
                let _ = reply.send(Err(make_err()));
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Returns true when the reactor should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Login { server, username, password, reply } => {
                self.cmd_login(server, username, password, reply).await;
            }
            Command::Logout { reply } => {
                let _ = reply.send(self.cmd_logout());
            }
            Command::Upload { req, reply } => self.cmd_upload(req, reply),
            Command::DnsRegister { domain, content_hash, reply } => {
                self.cmd_dns_register(domain, content_hash, reply)
            }
            Command::Report { content_hash, reported_user, reply } => {
                self.cmd_report(content_hash, reported_user, reply)
            }
            Command::Download { content_hash, reply } => {
                self.cmd_simple(SimpleKind::Content, reply, |r| {
                    r.emit(ev::REQUEST_CONTENT, RequestContent { content_hash })
                });
            }
            Command::DnsResolve { domain, reply } => {
                self.cmd_simple(SimpleKind::Resolution, reply, |r| {
                    r.emit(ev::RESOLVE_DNS, ResolveDns { domain })
                });
            }
            Command::Search { query, content_type, sort_by, reply } => {
                self.cmd_simple(SimpleKind::Search, reply, |r| {
                    r.emit(
                        ev::SEARCH_CONTENT,
                        SearchContent {
                            query,
                            limit: SEARCH_LIMIT,
                            content_type,
                            sort_by,
                        },
                    )
                });
            }
            Command::NetworkState { reply } => {
                self.cmd_simple(SimpleKind::Network, reply, |r| {
                    r.emit(ev::GET_NETWORK_STATE, serde_json::json!({}))
                });
            }
            Command::SyncFiles { reply } => {
                let _ = reply.send(self.emit_sync_files());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::CancelGated(action) => {
                self.fail_gated(action, HpsError::RequestTimeout);
            }
            Command::CancelSimple(kind) => {
                self.pending_simple.remove(&kind);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn cmd_login(
        &mut self,
        server: String,
        username: String,
        password: String,
        reply: GatedReply,
    ) {
        if self.pending_gated.contains_key(&PowAction::Login) {
            let _ = reply.send(Err(HpsError::InvalidArgument(
                "a login is already in progress".into(),
            )));
            return;
        }

        let server = if server.starts_with("http://") || server.starts_with("https://") {
            server
        } else {
            format!("http://{server}")
        };

        // Switching servers drops any previous connection and session.
        if let Some(t) = self.transport.take() {
            t.shutdown();
        }
        self.transport_rx = None;
        self.session.clear_auth();

        self.session.current_server = Some(server.clone());
        self.session.username = Some(username);
        self.session.password_hash = Some(Zeroizing::new(sha256_hex(password.as_bytes())));
        self.session.pending_login = true;

        info!(server = %server, "connecting");
        let (event_tx, event_rx) = mpsc::channel(64);
        let transport_config = TransportConfig {
            tls_no_verify: self.config.tls_no_verify,
            auto_reconnect: self.config.auto_reconnect,
        };
        let connect = transport::connect(&server, transport_config, event_tx);
        match tokio::time::timeout(Duration::from_secs(10), connect).await {
            Ok(Ok(handle)) => {
                self.transport = Some(handle);
                self.transport_rx = Some(event_rx);
                self.pending_gated.insert(
                    PowAction::Login,
                    PendingGated {
                        payload: GatedPayload::Login,
                        reply,
                        cancel: Arc::new(AtomicBool::new(false)),
                        state: GatedState::AwaitChallenge,
                    },
                );
            }
            Ok(Err(e)) => {
                self.session.pending_login = false;
                let _ = reply.send(Err(e));
            }
            Err(_) => {
                self.session.pending_login = false;
                let _ = reply.send(Err(HpsError::Connection(format!(
                    "timed out connecting to {server}"
                ))));
            }
        }
    }

    fn cmd_logout(&mut self) -> Result<(), HpsError> {
        self.fail_all_pending(|| HpsError::NotConnected);
        if let Some(t) = self.transport.take() {
            t.shutdown();
        }
        self.transport_rx = None;
        self.session.clear_auth();
        self.session.current_server = None;
        self.persist();
        Ok(())
    }

    fn cmd_upload(&mut self, req: UploadRequest, reply: GatedReply) {
        if let Err(e) = self.gated_preflight(PowAction::Upload) {
            let _ = reply.send(Err(e));
            return;
        }
        if req.payload.len() as u64 > MAX_UPLOAD_SIZE {
            let _ = reply.send(Err(HpsError::InvalidArgument(format!(
                "file too large: max {} MiB",
                MAX_UPLOAD_SIZE / (1024 * 1024)
            ))));
            return;
        }

        let username = self.session.current_user.clone().unwrap_or_default();
        let public_key_pem = {
            let keys = self.keys.read().expect("keystore lock poisoned");
            keys.public_key_pem().to_vec()
        };

        let framed = frame_blob(&username, &public_key_pem, &req.payload);
        let content_hash = content_hash_of(&framed).to_hex();
        let signature = match self.sign(&req.payload) {
            Ok(s) => s,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        // Keep a local copy before the network round-trip, like any other
        // known blob.
        let meta = ContentMeta {
            title: req.title.clone(),
            description: req.description.clone(),
            mime_type: req.mime_type.clone(),
            username,
            signature: B64.encode(&signature),
            public_key: B64.encode(&public_key_pem),
            verified: true,
        };
        match self.store.put(&content_hash, &framed) {
            Ok(path) => {
                if let Err(e) = self.db.upsert_content(
                    &content_hash,
                    &path.to_string_lossy(),
                    &format!("{content_hash}.dat"),
                    framed.len() as i64,
                    &meta,
                ) {
                    warn!(error = %e, "failed to index local upload copy");
                }
            }
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        }

        let payload = GatedPayload::Upload {
            content_hash,
            title: req.title,
            description: req.description,
            mime_type: req.mime_type,
            size: framed.len() as u64,
            signature_b64: B64.encode(&signature),
            content_b64: B64.encode(&framed),
        };
        self.request_pow(PowAction::Upload, payload, reply);
    }

    fn cmd_dns_register(&mut self, domain: String, content_hash: String, reply: GatedReply) {
        if let Err(e) = self.gated_preflight(PowAction::Dns) {
            let _ = reply.send(Err(e));
            return;
        }

        let username = self.session.current_user.clone().unwrap_or_default();
        let public_key_pem = {
            let keys = self.keys.read().expect("keystore lock poisoned");
            keys.public_key_pem().to_vec()
        };
        let document = ddns_document(&username, &public_key_pem, &domain, &content_hash);
        let signature = match self.sign(&document) {
            Ok(s) => s,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let payload = GatedPayload::Dns {
            domain,
            ddns_b64: B64.encode(&document),
            signature_b64: B64.encode(&signature),
        };
        self.request_pow(PowAction::Dns, payload, reply);
    }

    fn cmd_report(&mut self, content_hash: String, reported_user: String, reply: GatedReply) {
        if let Err(e) = self.gated_preflight(PowAction::Report) {
            let _ = reply.send(Err(e));
            return;
        }
        let reporter = self.session.current_user.clone().unwrap_or_default();
        if reported_user == reporter {
            let _ = reply.send(Err(HpsError::InvalidArgument(
                "you cannot report your own content".into(),
            )));
            return;
        }
        if self.session.reputation < hps_core::MIN_REPORT_REPUTATION {
            let _ = reply.send(Err(HpsError::InvalidArgument(
                "your reputation is too low to report content".into(),
            )));
            return;
        }
        match self.db.has_report(&reporter, &content_hash) {
            Ok(true) => {
                let _ = reply.send(Err(HpsError::InvalidArgument(
                    "you have already reported this content".into(),
                )));
                return;
            }
            Ok(false) => {}
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        }
        let payload = GatedPayload::Report { content_hash, reported_user };
        self.request_pow(PowAction::Report, payload, reply);
    }

    fn cmd_simple(
        &mut self,
        kind: SimpleKind,
        reply: SimpleReply,
        emit: impl FnOnce(&Self) -> Result<(), HpsError>,
    ) {
        if !self.connected() {
            let _ = reply.send(Err(HpsError::NotConnected));
            return;
        }
        if self.pending_simple.contains_key(&kind) {
            let _ = reply.send(Err(HpsError::InvalidArgument(
                "a request of this kind is already in flight".into(),
            )));
            return;
        }
        match emit(self) {
            Ok(()) => {
                self.pending_simple.insert(kind, reply);
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    fn emit_sync_files(&self) -> Result<(), HpsError> {
        let files = self
            .store
            .list()?
            .into_iter()
            .map(|(hash, size)| SyncFile {
                file_name: format!("{hash}.dat"),
                content_hash: hash,
                file_size: size,
            })
            .collect();
        self.emit(ev::SYNC_CLIENT_FILES, SyncClientFiles { files })
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            connected: self.connected(),
            current_user: self.session.current_user.clone(),
            current_server: self.session.current_server.clone(),
            reputation: self.session.reputation,
            session_id: self.session.session_id.clone(),
            node_id: self.session.node_id.clone(),
            client_identifier: self.session.client_identifier.clone(),
            stats: self.stats,
            banned_until: self.session.banned_until,
            disk_used: disk_usage(&self.config.data_dir),
        }
    }

    // ── Transport events ─────────────────────────────────────────────────────

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                debug!("transport up, requesting server auth challenge");
                if let Err(e) = self.emit(
                    ev::REQUEST_SERVER_AUTH_CHALLENGE,
                    serde_json::json!({}),
                ) {
                    warn!(error = %e, "failed to start handshake");
                }
            }
            TransportEvent::ConnectionLost => {
                warn!("connection lost, reconnecting");
            }
            TransportEvent::Closed => {
                warn!("connection closed");
                self.transport = None;
                self.fail_all_pending(|| HpsError::NotConnected);
                self.session.clear_auth();
                self.session.current_server = None;
                self.persist();
            }
            TransportEvent::Inbound(envelope) => self.handle_inbound(envelope),
        }
    }

    fn handle_inbound(&mut self, envelope: Envelope) {
        let result = match envelope.event.as_str() {
            sv::SERVER_AUTH_CHALLENGE => self.on_server_auth_challenge(&envelope),
            sv::SERVER_AUTH_RESULT => self.on_server_auth_result(&envelope),
            sv::POW_CHALLENGE => self.on_pow_challenge(&envelope),
            sv::AUTHENTICATION_RESULT => self.on_authentication_result(&envelope),
            sv::CONTENT_RESPONSE => self.on_content_response(&envelope),
            sv::PUBLISH_RESULT => self.on_publish_result(&envelope),
            sv::DNS_RESULT => self.on_dns_result(&envelope),
            sv::DNS_RESOLUTION => self.on_dns_resolution(&envelope),
            sv::SEARCH_RESULTS => self.on_search_results(&envelope),
            sv::NETWORK_STATE => self.on_network_state(&envelope),
            sv::REPORT_RESULT => self.on_report_result(&envelope),
            other => {
                debug!(event = other, "unknown server event ignored");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(event = %envelope.event, error = %e, "error handling server event");
        }
    }

    // ── Handshake ────────────────────────────────────────────────────────────

    fn on_server_auth_challenge(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: ServerAuthChallenge = envelope.parse()?;

        let server_pem = B64
            .decode(&msg.server_public_key)
            .map_err(|_| HpsError::Serialization("server public key is not base64".into()))?;
        let signature = B64
            .decode(&msg.signature)
            .map_err(|_| HpsError::Serialization("server signature is not base64".into()))?;

        // First contact pins the key for this server address; later
        // handshakes (reconnects) must present the same key.
        let pinned_mismatch = self
            .session
            .current_server
            .as_ref()
            .and_then(|server| self.session.server_public_keys.get(server))
            .is_some_and(|pinned| pinned != &msg.server_public_key);

        if pinned_mismatch
            || verify_with_pem(&server_pem, msg.challenge.as_bytes(), &signature).is_err()
        {
            warn!("server signature invalid, aborting session");
            self.fail_gated(PowAction::Login, HpsError::InvalidSignature);
            if let Some(t) = self.transport.take() {
                t.shutdown();
            }
            self.transport_rx = None;
            return Err(HpsError::InvalidSignature);
        }

        if let Some(server) = &self.session.current_server {
            self.session
                .server_public_keys
                .insert(server.clone(), msg.server_public_key.clone());
        }

        let client_challenge = Session::generate_client_challenge();
        self.session.client_auth_challenge = Some(client_challenge.clone());
        let client_signature = self.sign(client_challenge.as_bytes())?;

        self.emit(
            ev::VERIFY_SERVER_AUTH_RESPONSE,
            VerifyServerAuthResponse {
                client_challenge,
                client_signature: B64.encode(client_signature),
                client_public_key: self.public_key_b64(),
            },
        )
    }

    fn on_server_auth_result(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: ServerAuthResult = envelope.parse()?;
        if msg.success {
            info!("server authenticated");
            if self.session.pending_login {
                let request = RequestPowChallenge {
                    client_identifier: self.session.client_identifier.clone(),
                    action_type: PowAction::Login.wire_name().to_string(),
                };
                self.emit(ev::REQUEST_POW_CHALLENGE, request)?;
            }
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            warn!(error = %error, "server authentication failed");
            self.fail_gated(PowAction::Login, HpsError::ServerError(error));
        }
        Ok(())
    }

    // ── Proof-of-work ────────────────────────────────────────────────────────

    fn on_pow_challenge(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: PowChallenge = envelope.parse()?;

        if let Some(error) = msg.error {
            let until = msg.blocked_until.unwrap_or_else(now_secs);
            self.session.set_ban(until, &error);
            let make_err = || HpsError::Banned { until, reason: error.clone() };
            match msg.action_type.as_deref().and_then(PowAction::from_wire) {
                Some(action) => self.fail_gated(action, make_err()),
                // No action attribution: a ban blocks every gated flow.
                None => {
                    let actions: Vec<_> = self.pending_gated.keys().copied().collect();
                    for action in actions {
                        self.fail_gated(action, make_err());
                    }
                }
            }
            return Ok(());
        }

        let action = msg
            .action_type
            .as_deref()
            .and_then(PowAction::from_wire)
            .unwrap_or(PowAction::Login);
        let challenge = msg
            .challenge
            .ok_or_else(|| HpsError::Serialization("pow_challenge missing challenge".into()))?;
        let target_bits = msg
            .target_bits
            .ok_or_else(|| HpsError::Serialization("pow_challenge missing target_bits".into()))?;
        let target_seconds = msg.target_seconds.unwrap_or(30.0);

        let Some(pending) = self.pending_gated.get_mut(&action) else {
            debug!(%action, "pow_challenge without pending context ignored");
            return Ok(());
        };
        if pending.state != GatedState::AwaitChallenge {
            debug!(%action, "duplicate pow_challenge ignored");
            return Ok(());
        }
        pending.state = GatedState::Mining;

        info!(%action, target_bits, "mining proof of work");
        let cancel = pending.cancel.clone();
        let miner_tx = self.miner_tx.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = solve_challenge(&challenge, target_bits, target_seconds, &cancel, |p| {
                info!(
                    nonce = p.nonce,
                    hashrate = p.hashrate as u64,
                    elapsed = format!("{:.1}s", p.elapsed).as_str(),
                    "mining"
                );
            });
            let done = match outcome {
                Ok(solution) => MinerDone { action, solution, error: None },
                Err(e) => MinerDone { action, solution: None, error: Some(e) },
            };
            let _ = miner_tx.blocking_send(done);
        });
        Ok(())
    }

    fn handle_miner_done(&mut self, done: MinerDone) {
        let action = done.action;
        let Some(pending) = self.pending_gated.get_mut(&action) else {
            return;
        };

        let solution = match (done.solution, done.error) {
            (Some(solution), _) => solution,
            (None, error) => {
                let err = error.unwrap_or(HpsError::PowTimeout);
                self.fail_gated(action, err);
                return;
            }
        };

        info!(
            %action,
            nonce = solution.nonce,
            elapsed = format!("{:.2}s", solution.elapsed).as_str(),
            "proof of work solved"
        );
        self.stats.pow_solved += 1;
        self.stats.pow_time += solution.elapsed as i64;
        self.stats.hashes_calculated += solution.total_hashes as i64;
        pending.state = GatedState::AwaitTerminal;
        self.persist();

        let nonce = solution.nonce.to_string();
        let hashrate = solution.hashrate_observed;
        let result = match action {
            PowAction::Login => self.emit_authenticate(&nonce, hashrate),
            PowAction::Upload => self.emit_publish(&nonce, hashrate),
            PowAction::Dns => self.emit_register_dns(&nonce, hashrate),
            PowAction::Report => self.emit_report(&nonce, hashrate),
        };
        if let Err(e) = result {
            self.fail_gated(action, e);
        }
    }

    fn emit_authenticate(&mut self, pow_nonce: &str, hashrate: f64) -> Result<(), HpsError> {
        let username = self
            .session
            .username
            .clone()
            .ok_or(HpsError::InvalidArgument("no pending login".into()))?;
        let password_hash = self
            .session
            .password_hash
            .as_ref()
            .map(|p| p.to_string())
            .ok_or(HpsError::InvalidArgument("no pending login".into()))?;
        let client_challenge = self
            .session
            .client_auth_challenge
            .clone()
            .ok_or(HpsError::InvalidSignature)?;
        let client_challenge_signature = self.sign(client_challenge.as_bytes())?;

        self.emit(
            ev::AUTHENTICATE,
            Authenticate {
                username,
                password_hash,
                public_key: self.public_key_b64(),
                node_type: "client".into(),
                client_identifier: self.session.client_identifier.clone(),
                pow_nonce: pow_nonce.to_string(),
                hashrate_observed: hashrate,
                client_challenge_signature: B64.encode(client_challenge_signature),
                client_challenge,
            },
        )
    }

    fn emit_publish(&mut self, pow_nonce: &str, hashrate: f64) -> Result<(), HpsError> {
        let Some(PendingGated {
            payload:
                GatedPayload::Upload {
                    content_hash,
                    title,
                    description,
                    mime_type,
                    size,
                    signature_b64,
                    content_b64,
                },
            ..
        }) = self.pending_gated.get(&PowAction::Upload)
        else {
            return Err(HpsError::InvalidArgument("no pending upload".into()));
        };

        let request = PublishContent {
            content_hash: content_hash.clone(),
            title: title.clone(),
            description: description.clone(),
            mime_type: mime_type.clone(),
            size: *size,
            signature: signature_b64.clone(),
            public_key: self.public_key_b64(),
            content_b64: content_b64.clone(),
            pow_nonce: pow_nonce.to_string(),
            hashrate_observed: hashrate,
        };
        let size = *size;
        self.emit(ev::PUBLISH_CONTENT, request)?;
        self.stats.data_sent += size as i64;
        Ok(())
    }

    fn emit_register_dns(&mut self, pow_nonce: &str, hashrate: f64) -> Result<(), HpsError> {
        let Some(PendingGated {
            payload: GatedPayload::Dns { domain, ddns_b64, signature_b64 },
            ..
        }) = self.pending_gated.get(&PowAction::Dns)
        else {
            return Err(HpsError::InvalidArgument("no pending dns registration".into()));
        };

        let request = RegisterDns {
            domain: domain.clone(),
            ddns_content: ddns_b64.clone(),
            signature: signature_b64.clone(),
            public_key: self.public_key_b64(),
            pow_nonce: pow_nonce.to_string(),
            hashrate_observed: hashrate,
        };
        self.emit(ev::REGISTER_DNS, request)
    }

    fn emit_report(&mut self, pow_nonce: &str, hashrate: f64) -> Result<(), HpsError> {
        let Some(PendingGated {
            payload: GatedPayload::Report { content_hash, reported_user },
            ..
        }) = self.pending_gated.get(&PowAction::Report)
        else {
            return Err(HpsError::InvalidArgument("no pending report".into()));
        };
        let content_hash = content_hash.clone();
        let reported_user = reported_user.clone();
        let reporter = self.session.current_user.clone().unwrap_or_default();

        // Record locally first; the (reporter, hash) pair becomes the dedup
        // guard for future invocations.
        let report_id = sha256_hex(
            format!("{content_hash}{reported_user}{reporter}{}", now_secs()).as_bytes(),
        );
        self.db
            .insert_report(&report_id, &content_hash, &reported_user, &reporter)?;

        self.emit(
            ev::REPORT_CONTENT,
            ReportContent {
                content_hash,
                reported_user,
                reporter,
                pow_nonce: pow_nonce.to_string(),
                hashrate_observed: hashrate,
            },
        )
    }

    // ── Terminal events ──────────────────────────────────────────────────────

    fn on_authentication_result(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: AuthenticationResult = envelope.parse()?;
        let pending = self.pending_gated.remove(&PowAction::Login);
        self.session.pending_login = false;

        if msg.success {
            let username = msg
                .username
                .or_else(|| self.session.username.clone())
                .unwrap_or_default();
            let reputation = msg.reputation.unwrap_or(hps_core::DEFAULT_REPUTATION);
            self.session.current_user = Some(username.clone());
            self.session.username = Some(username.clone());
            self.session.reputation = reputation;
            self.stats.session_start = chrono::Utc::now().timestamp();
            info!(username = %username, reputation, "login successful");

            if let Some(server) = self.session.current_server.clone() {
                if let Err(e) = self.db.save_known_server(&server) {
                    warn!(error = %e, "failed to record known server");
                }
            }
            if let Err(e) = self.emit_join_network() {
                warn!(error = %e, "join_network failed");
            }
            if let Err(e) = self.emit_sync_files() {
                warn!(error = %e, "sync_client_files failed");
            }
            self.persist();

            if let Some(p) = pending {
                let _ = p
                    .reply
                    .send(Ok(GatedOutcome::Login(LoginOutcome { username, reputation })));
            }
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            warn!(error = %error, "login failed");
            // Fatal for this session: back to disconnected-but-running.
            self.session.clear_auth();
            if let Some(t) = self.transport.take() {
                t.shutdown();
            }
            self.transport_rx = None;
            if let Some(p) = pending {
                let _ = p.reply.send(Err(HpsError::ServerError(error)));
            }
        }
        Ok(())
    }

    fn emit_join_network(&self) -> Result<(), HpsError> {
        let username = self.session.current_user.clone().unwrap_or_default();
        self.emit(
            ev::JOIN_NETWORK,
            JoinNetwork {
                node_id: self.session.node_id.clone(),
                address: format!("client_{}", self.session.client_identifier),
                public_key: self.public_key_b64(),
                username,
                node_type: "client".into(),
                client_identifier: self.session.client_identifier.clone(),
            },
        )
    }

    fn on_publish_result(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: PublishResult = envelope.parse()?;
        let Some(pending) = self.pending_gated.remove(&PowAction::Upload) else {
            return Ok(());
        };
        if msg.success {
            let content_hash = match (&msg.content_hash, &pending.payload) {
                (Some(h), _) => h.clone(),
                (None, GatedPayload::Upload { content_hash, .. }) => content_hash.clone(),
                _ => String::new(),
            };
            self.stats.content_uploaded += 1;
            self.persist();
            info!(hash = %content_hash, "upload successful");
            let _ = pending
                .reply
                .send(Ok(GatedOutcome::Upload(UploadOutcome { content_hash })));
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            let _ = pending.reply.send(Err(HpsError::ServerError(error)));
        }
        Ok(())
    }

    fn on_dns_result(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: DnsResult = envelope.parse()?;
        let Some(pending) = self.pending_gated.remove(&PowAction::Dns) else {
            return Ok(());
        };
        if msg.success {
            let domain = match (&msg.domain, &pending.payload) {
                (Some(d), _) => d.clone(),
                (None, GatedPayload::Dns { domain, .. }) => domain.clone(),
                _ => String::new(),
            };
            self.stats.dns_registered += 1;
            self.persist();
            info!(domain = %domain, "name registered");
            let _ = pending.reply.send(Ok(GatedOutcome::Dns { domain }));
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            let _ = pending.reply.send(Err(HpsError::ServerError(error)));
        }
        Ok(())
    }

    fn on_report_result(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: ReportResult = envelope.parse()?;
        let Some(pending) = self.pending_gated.remove(&PowAction::Report) else {
            return Ok(());
        };
        if msg.success {
            self.stats.content_reported += 1;
            self.persist();
            let _ = pending.reply.send(Ok(GatedOutcome::Report));
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            let _ = pending.reply.send(Err(HpsError::ServerError(error)));
        }
        Ok(())
    }

    // ── Simple replies ───────────────────────────────────────────────────────

    fn on_content_response(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: ContentResponse = envelope.parse()?;
        let Some(reply) = self.pending_simple.remove(&SimpleKind::Content) else {
            return Ok(());
        };

        if let Some(error) = msg.error {
            let _ = reply.send(Err(HpsError::ServerError(error)));
            return Ok(());
        }

        let content = match msg
            .content
            .as_deref()
            .map(|c| B64.decode(c))
            .transpose()
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                let _ = reply.send(Err(HpsError::Serialization(
                    "content_response missing content".into(),
                )));
                return Ok(());
            }
            Err(_) => {
                let _ = reply.send(Err(HpsError::Serialization(
                    "content is not valid base64".into(),
                )));
                return Ok(());
            }
        };

        self.stats.data_received += content.len() as i64;
        self.stats.content_downloaded += 1;

        let actual_hash = sha256_hex(&content);
        let integrity_ok = actual_hash == msg.content_hash;
        if !integrity_ok {
            warn!(
                expected = %msg.content_hash,
                actual = %actual_hash,
                "content integrity compromised"
            );
        }

        let meta = ContentMeta {
            title: msg.title.clone(),
            description: msg.description.clone(),
            mime_type: msg.mime_type.clone(),
            username: msg.username.clone(),
            signature: msg.signature.clone(),
            public_key: msg.public_key.clone(),
            verified: msg.verified,
        };
        match self.store.put(&msg.content_hash, &content) {
            Ok(path) => {
                if let Err(e) = self.db.upsert_content(
                    &msg.content_hash,
                    &path.to_string_lossy(),
                    &format!("{}.dat", msg.content_hash),
                    content.len() as i64,
                    &meta,
                ) {
                    warn!(error = %e, "failed to index downloaded blob");
                }
            }
            Err(e) => warn!(error = %e, "failed to persist downloaded blob"),
        }
        self.persist();

        let _ = reply.send(Ok(SimpleOutcome::Content(DownloadOutcome {
            content,
            content_hash: msg.content_hash,
            title: msg.title,
            description: msg.description,
            mime_type: msg.mime_type,
            username: msg.username,
            verified: msg.verified,
            integrity_ok,
        })));
        Ok(())
    }

    fn on_dns_resolution(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: DnsResolution = envelope.parse()?;
        let Some(reply) = self.pending_simple.remove(&SimpleKind::Resolution) else {
            return Ok(());
        };

        if msg.success {
            let outcome = ResolveOutcome {
                domain: msg.domain.unwrap_or_default(),
                content_hash: msg.content_hash.unwrap_or_default(),
                username: msg.username.unwrap_or_default(),
                verified: msg.verified,
            };
            let record = DnsRecordRow {
                domain: outcome.domain.clone(),
                content_hash: outcome.content_hash.clone(),
                username: outcome.username.clone(),
                verified: outcome.verified,
                timestamp: now_secs(),
                ddns_hash: String::new(),
            };
            if let Err(e) = self.db.upsert_dns_record(&record) {
                warn!(error = %e, "failed to cache dns record");
            }
            let _ = reply.send(Ok(SimpleOutcome::Resolution(outcome)));
        } else {
            let error = msg.error.unwrap_or_else(|| "unknown error".into());
            let _ = reply.send(Err(HpsError::ServerError(error)));
        }
        Ok(())
    }

    fn on_search_results(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: SearchResults = envelope.parse()?;
        let Some(reply) = self.pending_simple.remove(&SimpleKind::Search) else {
            return Ok(());
        };
        match msg.error {
            Some(error) => {
                let _ = reply.send(Err(HpsError::ServerError(error)));
            }
            None => {
                let _ = reply.send(Ok(SimpleOutcome::Search(msg.results)));
            }
        }
        Ok(())
    }

    fn on_network_state(&mut self, envelope: &Envelope) -> Result<(), HpsError> {
        let msg: NetworkState = envelope.parse()?;
        let Some(reply) = self.pending_simple.remove(&SimpleKind::Network) else {
            return Ok(());
        };
        if let Some(error) = msg.error {
            let _ = reply.send(Err(HpsError::ServerError(error)));
            return Ok(());
        }

        for node in &msg.nodes {
            let row = NetworkNodeRow {
                node_id: node.node_id.clone(),
                address: node.address.clone(),
                node_type: node.node_type.clone(),
                reputation: node.reputation,
                status: node.status.clone(),
                last_seen: now_secs(),
            };
            if let Err(e) = self.db.upsert_network_node(&row) {
                warn!(error = %e, "failed to record network node");
            }
        }

        let _ = reply.send(Ok(SimpleOutcome::Network(NetworkInfo {
            online_nodes: msg.online_nodes,
            total_content: msg.total_content,
            total_dns: msg.total_dns,
            node_types: msg.node_types,
        })));
        Ok(())
    }
}
