//! hps-cli
//!
//! Interactive client for the HPS peer-to-peer content and naming network.
//!
//! Startup sequence:
//!   1. Load (or generate) the RSA-4096 identity
//!   2. Open the SQLite database and the content store
//!   3. Spawn the network reactor and restore session state
//!   4. Start the controller-file bridge for sibling processes
//!   5. Run the interactive REPL until `exit`
//!
//! Usage:
//!   hps-cli [--no-cli] [--data-dir <path>] [--tls-no-verify]

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use clap::Parser;

use hps_crypto::KeyStore;
use hps_net::ReactorConfig;
use hps_store::{ContentStore, Db};

use hps_cli::commands::{Dispatcher, ExecContext};
use hps_cli::controller::Controller;
use hps_cli::display::{self, Display};

#[derive(Parser, Debug)]
#[command(
    name = "hps-cli",
    version,
    about = "HPS CLI — Hsyst P2P Browser via command line"
)]
struct Args {
    /// Non-interactive mode: prompts become errors, output is plain ASCII.
    #[arg(long)]
    no_cli: bool,

    /// Data directory (keys, database, blobs, controller file).
    #[arg(long, default_value = "~/.hps_cli")]
    data_dir: PathBuf,

    /// Skip TLS certificate chain and hostname verification for https
    /// servers. Unauthenticated; only for servers you already trust.
    #[arg(long)]
    tls_no_verify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,hps_net=info,hps_cli=info".parse().expect("valid filter")),
        )
        .init();

    let args = Args::parse();
    let display = Display::new(args.no_cli);
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    // ── Identity, database, blob store ───────────────────────────────────────
    let keys = KeyStore::load_or_generate(&data_dir).context("loading identity keys")?;
    let keys = Arc::new(RwLock::new(keys));
    let db = Arc::new(Db::open(data_dir.join("hps_cli.db")).context("opening database")?);
    let store = Arc::new(ContentStore::open(&data_dir).context("opening content store")?);

    // ── Reactor ──────────────────────────────────────────────────────────────
    let reactor_config = ReactorConfig {
        data_dir: data_dir.clone(),
        tls_no_verify: args.tls_no_verify,
        auto_reconnect: true,
    };
    let client = hps_net::spawn(
        reactor_config,
        Arc::clone(&db),
        Arc::clone(&store),
        Arc::clone(&keys),
    );

    let dispatcher = Arc::new(Dispatcher {
        client: client.clone(),
        db,
        store,
        keys,
        data_dir: data_dir.clone(),
        no_cli: args.no_cli,
    });

    // ── Controller bridge ────────────────────────────────────────────────────
    let controller = Arc::new(
        Controller::new(&data_dir, Arc::clone(&dispatcher))
            .context("setting up controller bridge")?,
    );
    controller.cleanup();
    let watcher = Arc::clone(&controller).start().context("starting controller watcher")?;

    // Ctrl-C must not abort in-flight waits; the user types `exit`.
    tokio::spawn({
        let display = display;
        async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                display.info("Use 'exit' to quit");
            }
        }
    });

    // ── Interactive loop ─────────────────────────────────────────────────────
    display.clear_screen();
    display.logo();
    display.info("Type 'help' for available commands");

    loop {
        let snapshot = client.snapshot().await.ok();
        let (user, server) = match &snapshot {
            Some(s) => (s.current_user.as_deref(), s.current_server.as_deref()),
            None => (None, None),
        };
        let prompt = display.prompt(user, server);

        let line = tokio::task::spawn_blocking(move || display::read_input(&prompt)).await;
        let line = match line {
            Ok(Ok(line)) => line,
            Ok(Err(_)) | Err(_) => break, // EOF or input error
        };
        if line.is_empty() {
            continue;
        }

        let output = dispatcher.execute(&line, ExecContext::Repl).await;
        if output.clear {
            display.clear_screen();
            display.logo();
        }
        if !output.message.is_empty() {
            if output.success {
                display.plain(&output.message);
            } else {
                display.error(&output.message);
            }
        }
        if output.exit {
            break;
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────────
    watcher.abort();
    controller.cleanup();
    client.shutdown().await;
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
