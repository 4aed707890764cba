//! Verb dispatch.
//!
//! Handlers return a structured [`CommandOutput`]; the REPL prints it and
//! the controller bridge serializes it into a response log. Every invocation
//! appends a history row, including unknown verbs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::warn;

use hps_core::{is_valid_domain, ContentHash, HpsError, DISK_QUOTA, MAX_UPLOAD_SIZE};
use hps_crypto::KeyStore;
use hps_net::{Client, UploadRequest};
use hps_store::{ContentStore, Db};

use crate::display::{format_kv, format_table};

/// Structured result of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub message: String,
    /// The REPL should terminate after rendering this output.
    pub exit: bool,
    /// The REPL should clear the screen before rendering this output.
    pub clear: bool,
}

impl CommandOutput {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), ..Default::default() }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), ..Default::default() }
    }
}

/// Where a command came from. Controller-driven commands never prompt and
/// `dns-res` inherits the host process's connection state.
#[derive(Debug, Clone, Default)]
pub enum ExecContext {
    #[default]
    Repl,
    Controller {
        /// Host state snapshot taken when the command was accepted.
        host_user: Option<String>,
    },
}

pub struct Dispatcher {
    pub client: Client,
    pub db: Arc<Db>,
    pub store: Arc<ContentStore>,
    pub keys: Arc<RwLock<KeyStore>>,
    pub data_dir: PathBuf,
    pub no_cli: bool,
}

impl Dispatcher {
    /// Parse a command line, run the verb, record history.
    pub async fn execute(&self, line: &str, ctx: ExecContext) -> CommandOutput {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return CommandOutput::ok("");
        };
        let verb = verb.to_lowercase();
        let args: Vec<&str> = parts.collect();

        let output = self.dispatch(&verb, &args, &ctx).await;

        let result = output.message.lines().next().unwrap_or("").to_string();
        if let Err(e) = self.db.append_history(line.trim(), output.success, &result) {
            warn!(error = %e, "failed to record history");
        }
        output
    }

    async fn dispatch(&self, verb: &str, args: &[&str], ctx: &ExecContext) -> CommandOutput {
        match verb {
            "login" => self.cmd_login(args, ctx).await,
            "logout" => self.cmd_logout().await,
            "upload" => self.cmd_upload(args).await,
            "download" => self.cmd_download(args, ctx).await,
            "dns-reg" => self.cmd_dns_register(args).await,
            "dns-res" => self.cmd_dns_resolve(args, ctx).await,
            "search" => self.cmd_search(args, ctx).await,
            "network" => self.cmd_network(ctx).await,
            "stats" => self.cmd_stats().await,
            "report" => self.cmd_report(args).await,
            "security" => self.cmd_security(args),
            "servers" => self.cmd_servers(args).await,
            "keys" => self.cmd_keys(args).await,
            "sync" => self.cmd_sync().await,
            "history" => self.cmd_history(),
            "clear" => CommandOutput { success: true, clear: true, ..Default::default() },
            "help" => CommandOutput::ok(HELP_TEXT),
            "exit" | "quit" => CommandOutput {
                success: true,
                message: "Exiting HPS CLI...".into(),
                exit: true,
                ..Default::default()
            },
            other => CommandOutput::fail(format!("Unknown command: {other}")),
        }
    }

    async fn logged_in_user(&self) -> Option<String> {
        self.client.snapshot().await.ok().and_then(|s| s.current_user)
    }

    // ── Session verbs ────────────────────────────────────────────────────────

    async fn cmd_login(&self, args: &[&str], ctx: &ExecContext) -> CommandOutput {
        let (server, username, password) = if args.len() >= 3 {
            (args[0].to_string(), args[1].to_string(), args[2].to_string())
        } else if !self.no_cli && matches!(ctx, ExecContext::Repl) {
            let prompted = tokio::task::spawn_blocking(|| {
                let server = crate::display::read_input("Server (ex: localhost:8080): ")?;
                let username = crate::display::read_input("Username: ")?;
                let password = crate::display::read_input("Password: ")?;
                Ok::<_, std::io::Error>((server, username, password))
            })
            .await;
            match prompted {
                Ok(Ok(values)) => values,
                _ => return CommandOutput::fail("Usage: login <server> <username> <password>"),
            }
        } else {
            return CommandOutput::fail("Usage: login <server> <username> <password>");
        };

        match self.client.login(&server, &username, &password).await {
            Ok(outcome) => CommandOutput::ok(format!(
                "Login successful: {} (reputation {})",
                outcome.username, outcome.reputation
            )),
            Err(e) => CommandOutput::fail(format!("Login failed: {e}")),
        }
    }

    async fn cmd_logout(&self) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You are not logged in");
        }
        match self.client.logout().await {
            Ok(()) => CommandOutput::ok("Logout successful"),
            Err(e) => CommandOutput::fail(format!("Logout failed: {e}")),
        }
    }

    // ── Content verbs ────────────────────────────────────────────────────────

    async fn cmd_upload(&self, args: &[&str]) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to upload");
        }
        if args.is_empty() {
            return CommandOutput::fail(
                "Usage: upload <file_path> [--title TITLE] [--desc DESCRIPTION] [--mime MIME_TYPE]",
            );
        }

        let file_path = Path::new(args[0]);
        let mut title: Option<String> = None;
        let mut description = String::new();
        let mut mime_type: Option<String> = None;

        let mut i = 1;
        while i < args.len() {
            match args[i] {
                "--title" if i + 1 < args.len() => {
                    title = Some(args[i + 1].to_string());
                    i += 2;
                }
                "--desc" if i + 1 < args.len() => {
                    description = args[i + 1].to_string();
                    i += 2;
                }
                "--mime" if i + 1 < args.len() => {
                    mime_type = Some(args[i + 1].to_string());
                    i += 2;
                }
                other => return CommandOutput::fail(format!("Unknown argument: {other}")),
            }
        }

        let payload = match tokio::fs::read(file_path).await {
            Ok(bytes) => bytes,
            Err(e) => return CommandOutput::fail(format!("File not found: {e}")),
        };
        if payload.len() as u64 > MAX_UPLOAD_SIZE {
            return CommandOutput::fail(format!(
                "File too large. Max size: {}MB",
                MAX_UPLOAD_SIZE / (1024 * 1024)
            ));
        }

        let title = title.unwrap_or_else(|| {
            file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".into())
        });
        let mime_type = mime_type.unwrap_or_else(|| {
            mime_guess::from_path(file_path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        });

        match self
            .client
            .upload(UploadRequest { payload, title, description, mime_type })
            .await
        {
            Ok(outcome) => {
                CommandOutput::ok(format!("Upload completed. Hash: {}", outcome.content_hash))
            }
            Err(e) => CommandOutput::fail(format!("Upload failed: {e}")),
        }
    }

    async fn cmd_download(&self, args: &[&str], ctx: &ExecContext) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to download");
        }
        if args.is_empty() {
            return CommandOutput::fail("Usage: download <hash_or_url> [--output PATH]");
        }

        let target = args[0];
        let mut output_path: Option<PathBuf> = None;
        let mut i = 1;
        while i < args.len() {
            match args[i] {
                "--output" if i + 1 < args.len() => {
                    output_path = Some(PathBuf::from(args[i + 1]));
                    i += 2;
                }
                other => return CommandOutput::fail(format!("Unknown argument: {other}")),
            }
        }

        // hps:// URLs route to the network view, name resolution, or a hash.
        let content_hash = if let Some(rest) = target.strip_prefix("hps://") {
            if rest == "rede" {
                return self.cmd_network(ctx).await;
            } else if let Some(domain) = rest.strip_prefix("dns:") {
                return self.cmd_dns_resolve(&[domain], ctx).await;
            }
            rest
        } else {
            target
        };
        if let Err(e) = ContentHash::from_hex(content_hash) {
            return CommandOutput::fail(e.to_string());
        }

        let outcome = match self.client.download(content_hash).await {
            Ok(o) => o,
            Err(e) => return CommandOutput::fail(format!("Download failed: {e}")),
        };

        let output_path = output_path.unwrap_or_else(|| {
            let mut path = PathBuf::from(format!("./{}", outcome.title));
            if path.extension().is_none() {
                let ext = mime_guess::get_mime_extensions_str(&outcome.mime_type)
                    .and_then(|exts| exts.first())
                    .copied()
                    .unwrap_or("dat");
                path.set_extension(ext);
            }
            path
        });

        if let Err(e) = tokio::fs::write(&output_path, &outcome.content).await {
            return CommandOutput::fail(format!("Error saving file: {e}"));
        }

        let mut lines = vec![format!("Content saved to: {}", output_path.display())];
        lines.push(format!("Title: {}", outcome.title));
        lines.push(format!("Author: {}", outcome.username));
        lines.push(format!("Type: {}", outcome.mime_type));
        lines.push(format!("Size: {} bytes", outcome.content.len()));
        lines.push(format!("Verified: {}", if outcome.verified { "Yes" } else { "No" }));
        if !outcome.integrity_ok {
            lines.push("WARNING: file integrity compromised".into());
        }
        CommandOutput { success: outcome.integrity_ok, message: lines.join("\n"), ..Default::default() }
    }

    // ── Name verbs ───────────────────────────────────────────────────────────

    async fn cmd_dns_register(&self, args: &[&str]) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to register DNS");
        }
        if args.len() < 2 {
            return CommandOutput::fail("Usage: dns-reg <domain> <content_hash>");
        }
        let domain = args[0].to_lowercase();
        let content_hash = args[1];
        if !is_valid_domain(&domain) {
            return CommandOutput::fail(
                "Invalid domain. Use only lowercase letters, numbers and hyphens.",
            );
        }
        if let Err(e) = ContentHash::from_hex(content_hash) {
            return CommandOutput::fail(e.to_string());
        }

        match self.client.dns_register(&domain, content_hash).await {
            Ok(domain) => CommandOutput::ok(format!("DNS registered: {domain}")),
            Err(e) => CommandOutput::fail(format!("DNS registration failed: {e}")),
        }
    }

    async fn cmd_dns_resolve(&self, args: &[&str], ctx: &ExecContext) -> CommandOutput {
        let inherited = matches!(ctx, ExecContext::Controller { host_user: Some(_) });
        if self.logged_in_user().await.is_none() && !inherited {
            return CommandOutput::fail("You need to be logged in to resolve DNS");
        }
        if args.is_empty() {
            return CommandOutput::fail("Usage: dns-res <domain>");
        }
        let domain = args[0].to_lowercase();

        match self.client.dns_resolve(&domain).await {
            Ok(outcome) => {
                // Controller siblings consume the bare hash.
                if matches!(ctx, ExecContext::Controller { .. }) {
                    CommandOutput::ok(outcome.content_hash)
                } else {
                    CommandOutput::ok(format!(
                        "DNS resolved: {} -> {}\nOwner: {}\nVerified: {}",
                        outcome.domain,
                        outcome.content_hash,
                        outcome.username,
                        if outcome.verified { "Yes" } else { "No" }
                    ))
                }
            }
            Err(e) => CommandOutput::fail(format!("DNS resolution failed: {e}")),
        }
    }

    // ── Catalog verbs ────────────────────────────────────────────────────────

    async fn cmd_search(&self, args: &[&str], ctx: &ExecContext) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to search");
        }
        if args.is_empty() {
            return CommandOutput::fail("Usage: search <term> [--type TYPE] [--sort ORDER]");
        }

        let query = args[0];
        let mut content_type = "all".to_string();
        let mut sort_by = "reputation".to_string();
        let mut i = 1;
        while i < args.len() {
            match args[i] {
                "--type" if i + 1 < args.len() => {
                    content_type = args[i + 1].to_string();
                    i += 2;
                }
                "--sort" if i + 1 < args.len() => {
                    sort_by = args[i + 1].to_string();
                    i += 2;
                }
                other => return CommandOutput::fail(format!("Unknown argument: {other}")),
            }
        }
        let wire_type = if content_type == "all" { "" } else { &content_type };

        let results = match self.client.search(query, wire_type, &sort_by).await {
            Ok(r) => r,
            Err(e) => return CommandOutput::fail(format!("Search failed: {e}")),
        };
        if results.is_empty() {
            return CommandOutput::ok("No results found");
        }

        if matches!(ctx, ExecContext::Controller { .. }) {
            let lines: Vec<String> = results
                .iter()
                .map(|r| format!("{}|{}|{}", r.content_hash, r.title, r.username))
                .collect();
            return CommandOutput::ok(lines.join("\n"));
        }

        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                let hash_short = if r.content_hash.len() > 16 {
                    format!("{}...", &r.content_hash[..16])
                } else {
                    r.content_hash.clone()
                };
                vec![
                    if r.verified { "ok" } else { "?" }.to_string(),
                    r.title.clone(),
                    hash_short,
                    r.username.clone(),
                    r.mime_type.clone(),
                    r.reputation.to_string(),
                ]
            })
            .collect();
        CommandOutput::ok(format_table(
            &["V", "Title", "Hash", "Author", "Type", "Reputation"],
            &rows,
        ))
    }

    async fn cmd_network(&self, ctx: &ExecContext) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to view network state");
        }
        let info = match self.client.network_state().await {
            Ok(i) => i,
            Err(e) => return CommandOutput::fail(format!("Failed to get network state: {e}")),
        };

        let mut lines = vec![
            format!("Online nodes: {}", info.online_nodes),
            format!("Total content: {}", info.total_content),
            format!("Registered DNS: {}", info.total_dns),
        ];
        for (node_type, count) in &info.node_types {
            lines.push(format!("  {node_type}: {count}"));
        }

        if matches!(ctx, ExecContext::Repl) {
            if let Ok(nodes) = self.db.recent_network_nodes(20) {
                if !nodes.is_empty() {
                    let rows: Vec<Vec<String>> = nodes
                        .iter()
                        .map(|n| {
                            let id_short = if n.node_id.len() > 12 {
                                format!("{}...", &n.node_id[..12])
                            } else {
                                n.node_id.clone()
                            };
                            vec![
                                id_short,
                                n.address.clone(),
                                n.node_type.clone(),
                                n.reputation.to_string(),
                                n.status.clone(),
                            ]
                        })
                        .collect();
                    lines.push(String::new());
                    lines.push(format_table(
                        &["ID", "Address", "Type", "Reputation", "Status"],
                        &rows,
                    ));
                }
            }
        }
        CommandOutput::ok(lines.join("\n"))
    }

    // ── Local verbs ──────────────────────────────────────────────────────────

    async fn cmd_stats(&self) -> CommandOutput {
        let snap = match self.client.snapshot().await {
            Ok(s) => s,
            Err(e) => return CommandOutput::fail(format!("Stats unavailable: {e}")),
        };
        let stats = snap.stats;

        let session_time = if stats.session_start > 0 {
            let secs = (chrono::Utc::now().timestamp() - stats.session_start).max(0);
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        } else {
            "Not logged in".to_string()
        };
        let mb = |bytes: i64| format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0));

        let pairs = [
            ("Session Time", session_time),
            ("Data Sent", mb(stats.data_sent)),
            ("Data Received", mb(stats.data_received)),
            ("Content Downloaded", format!("{} files", stats.content_downloaded)),
            ("Content Published", format!("{} files", stats.content_uploaded)),
            ("DNS Registered", format!("{} domains", stats.dns_registered)),
            ("PoW Solved", stats.pow_solved.to_string()),
            ("Total PoW Time", format!("{}s", stats.pow_time)),
            ("Hashes Calculated", stats.hashes_calculated.to_string()),
            ("Content Reported", stats.content_reported.to_string()),
            (
                "Disk Space",
                format!(
                    "{:.2}MB/{:.2}MB",
                    snap.disk_used as f64 / (1024.0 * 1024.0),
                    DISK_QUOTA as f64 / (1024.0 * 1024.0)
                ),
            ),
            ("Reputation", snap.reputation.to_string()),
            ("User", snap.current_user.unwrap_or_else(|| "Not logged in".into())),
            ("Server", snap.current_server.unwrap_or_else(|| "Not connected".into())),
        ];
        CommandOutput::ok(format_kv(&pairs))
    }

    async fn cmd_report(&self, args: &[&str]) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to report content");
        }
        if args.len() < 2 {
            return CommandOutput::fail("Usage: report <content_hash> <reported_user>");
        }
        match self.client.report(args[0], args[1]).await {
            Ok(()) => CommandOutput::ok("Content reported successfully"),
            Err(HpsError::InvalidArgument(msg)) => CommandOutput::fail(msg),
            Err(e) => CommandOutput::fail(format!("Report failed: {e}")),
        }
    }

    fn cmd_security(&self, args: &[&str]) -> CommandOutput {
        if args.is_empty() {
            return CommandOutput::fail("Usage: security <content_hash>");
        }
        let content_hash = args[0];

        let row = match self.db.get_content(content_hash) {
            Ok(Some(row)) => row,
            Ok(None) => return CommandOutput::fail("Content not found in local cache"),
            Err(e) => return CommandOutput::fail(format!("Cache lookup failed: {e}")),
        };
        let report = match self.store.verify(content_hash, &row.meta) {
            Ok(r) => r,
            Err(e) => return CommandOutput::fail(format!("Content file not readable: {e}")),
        };

        let verdict = if !report.integrity_ok {
            "CONTENT TAMPERED"
        } else if report.signature_ok {
            "CONTENT VERIFIED"
        } else {
            "CONTENT NOT VERIFIED"
        };
        let pairs = [
            ("Title", row.meta.title.clone()),
            ("Author", row.meta.username.clone()),
            ("Hash", content_hash.to_string()),
            ("MIME Type", row.meta.mime_type.clone()),
            ("Integrity", if report.integrity_ok { "OK" } else { "COMPROMISED" }.into()),
            ("Valid Signature", if report.signature_ok { "Yes" } else { "No" }.into()),
            ("Size", format!("{} bytes", row.size)),
        ];
        CommandOutput {
            success: report.integrity_ok,
            message: format!("{verdict}\n{}", format_kv(&pairs)),
            ..Default::default()
        }
    }

    async fn cmd_servers(&self, args: &[&str]) -> CommandOutput {
        match args.first().copied() {
            None | Some("list") => {
                let servers = match self.db.load_known_servers() {
                    Ok(s) => s,
                    Err(e) => return CommandOutput::fail(format!("Server list failed: {e}")),
                };
                if servers.is_empty() {
                    return CommandOutput::ok("No known servers");
                }
                let current = self
                    .client
                    .snapshot()
                    .await
                    .ok()
                    .and_then(|s| s.current_server);
                let lines: Vec<String> = servers
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let status = if current.as_deref() == Some(s.as_str()) {
                            "Connected"
                        } else {
                            "Available"
                        };
                        format!("{}. {} [{}]", i + 1, s, status)
                    })
                    .collect();
                CommandOutput::ok(lines.join("\n"))
            }
            Some("add") => {
                let Some(addr) = args.get(1) else {
                    return CommandOutput::fail("Usage: servers add <address>");
                };
                match self.db.save_known_server(addr) {
                    Ok(()) => CommandOutput::ok(format!("Server {addr} added")),
                    Err(e) => CommandOutput::fail(format!("Failed to add server: {e}")),
                }
            }
            Some("remove") => {
                let Some(which) = args.get(1) else {
                    return CommandOutput::fail("Usage: servers remove <number_or_address>");
                };
                let servers = self.db.load_known_servers().unwrap_or_default();
                let addr = match which.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= servers.len() => servers[n - 1].clone(),
                    _ => which.to_string(),
                };
                match self.db.remove_known_server(&addr) {
                    Ok(()) => CommandOutput::ok(format!("Server {addr} removed")),
                    Err(e) => CommandOutput::fail(format!("Failed to remove server: {e}")),
                }
            }
            Some(other) => CommandOutput::fail(format!(
                "Unknown subcommand: {other} (use: servers [list|add|remove])"
            )),
        }
    }

    async fn cmd_keys(&self, args: &[&str]) -> CommandOutput {
        match args.first().copied() {
            None => CommandOutput::ok(
                "Available commands:\n  keys generate  - Generate new keys\n  keys export <path> - Export keys\n  keys import <path> - Import keys\n  keys show      - Show public key",
            ),
            Some("generate") => {
                let generated = tokio::task::spawn_blocking(KeyStore::generate).await;
                let keystore = match generated {
                    Ok(Ok(ks)) => ks,
                    Ok(Err(e)) => return CommandOutput::fail(format!("Key generation failed: {e}")),
                    Err(e) => return CommandOutput::fail(format!("Key generation failed: {e}")),
                };
                if let Err(e) = keystore.save(&self.data_dir) {
                    return CommandOutput::fail(format!("Failed to save keys: {e}"));
                }
                *self.keys.write().expect("keystore lock poisoned") = keystore;
                CommandOutput::ok("New keys generated and saved")
            }
            Some("export") => {
                let Some(path) = args.get(1) else {
                    return CommandOutput::fail("Usage: keys export <file_path>");
                };
                let result = {
                    let keys = self.keys.read().expect("keystore lock poisoned");
                    keys.export(Path::new(path))
                };
                match result {
                    Ok(()) => CommandOutput::ok(format!("Private key exported to: {path}")),
                    Err(e) => CommandOutput::fail(format!("Export failed: {e}")),
                }
            }
            Some("import") => {
                let Some(path) = args.get(1) else {
                    return CommandOutput::fail("Usage: keys import <file_path>");
                };
                let imported = match KeyStore::import(Path::new(path)) {
                    Ok(ks) => ks,
                    Err(e) => return CommandOutput::fail(format!("Import failed: {e}")),
                };
                if let Err(e) = imported.save(&self.data_dir) {
                    return CommandOutput::fail(format!("Failed to save imported keys: {e}"));
                }
                *self.keys.write().expect("keystore lock poisoned") = imported;
                CommandOutput::ok("Keys imported successfully")
            }
            Some("show") => {
                let pem = {
                    let keys = self.keys.read().expect("keystore lock poisoned");
                    String::from_utf8_lossy(keys.public_key_pem()).into_owned()
                };
                CommandOutput::ok(pem)
            }
            Some(other) => CommandOutput::fail(format!("Unknown subcommand: {other}")),
        }
    }

    async fn cmd_sync(&self) -> CommandOutput {
        if self.logged_in_user().await.is_none() {
            return CommandOutput::fail("You need to be logged in to sync");
        }
        if let Err(e) = self.client.sync_files().await {
            return CommandOutput::fail(format!("Sync failed: {e}"));
        }
        if let Err(e) = self.client.network_state().await {
            return CommandOutput::fail(format!("Sync failed: {e}"));
        }
        CommandOutput::ok("Sync completed")
    }

    fn cmd_history(&self) -> CommandOutput {
        let rows = match self.db.recent_history(20) {
            Ok(r) => r,
            Err(e) => return CommandOutput::fail(format!("History unavailable: {e}")),
        };
        if rows.is_empty() {
            return CommandOutput::ok("No history available");
        }
        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                let time = chrono::DateTime::from_timestamp(r.timestamp as i64, 0)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                let cmd_short = if r.command.len() > 30 {
                    format!("{}...", &r.command[..30])
                } else {
                    r.command.clone()
                };
                vec![
                    time,
                    cmd_short,
                    if r.success { "ok" } else { "failed" }.to_string(),
                    r.result.chars().take(30).collect(),
                ]
            })
            .collect();
        CommandOutput::ok(format_table(&["Time", "Command", "Status", "Result"], &table))
    }
}

const HELP_TEXT: &str = "\
Available Commands:
  login <server> <user> <pass>  Connect to P2P network
  logout                        Disconnect from network
  upload <file> [options]       Upload file
  download <hash_or_url>        Download content
  dns-reg <domain> <hash>       Register DNS domain
  dns-res <domain>              Resolve DNS domain
  search <term> [options]       Search content
  network                       View network state
  stats                         View statistics
  report <hash> <user>          Report content
  security <hash>               Verify security
  servers [list|add|remove]     Manage servers
  keys [subcommand]             Manage cryptographic keys
  sync                          Sync with network
  history                       View command history
  clear                         Clear screen
  help                          Show this help
  exit/quit                     Exit program

Upload Options:
  --title TITLE       Content title
  --desc DESCRIPTION  Content description
  --mime MIME_TYPE    MIME type (ex: text/plain, image/jpeg)

Search Options:
  --type TYPE         Content type (all, image, video, document, text)
  --sort ORDER        Sort by (reputation, recent, popular)

URLs:
  hps://rede          Show the P2P network
  hps://dns:<name>    Resolve a registered name
  hps://<hash>        Download by content hash";
