//! Controller-file bridge cycle: a sender writes a verb into the controller
//! file, the watcher hands back a response-log path, executes the verb, and
//! the sender reads the terminal indicator.
//!
//! Run with:
//!   cargo test -p hps-cli --test controller

use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use hps_cli::commands::{Dispatcher, ExecContext};
use hps_cli::controller::{send_command, Controller, ControllerPaths};
use hps_crypto::KeyStore;
use hps_net::ReactorConfig;
use hps_store::{ContentStore, Db};

fn shared_keys() -> &'static KeyStore {
    static KS: OnceLock<KeyStore> = OnceLock::new();
    KS.get_or_init(|| KeyStore::generate().expect("generate keypair"))
}

struct Stack {
    _dir: tempfile::TempDir,
    dispatcher: Arc<Dispatcher>,
}

impl Stack {
    fn data_dir(&self) -> &Path {
        self._dir.path()
    }
}

/// Offline client stack: reactor running, no server connection.
async fn offline_stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    shared_keys().save(dir.path()).unwrap();
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
        Arc::clone(&keys),
    );
    let dispatcher = Arc::new(Dispatcher {
        client,
        db,
        store,
        keys,
        data_dir: dir.path().to_path_buf(),
        no_cli: true,
    });
    Stack { _dir: dir, dispatcher }
}

#[tokio::test]
async fn controller_bridge_cycle() {
    let stack = offline_stack().await;
    let controller = Arc::new(
        Controller::new(stack.data_dir(), Arc::clone(&stack.dispatcher)).unwrap(),
    );
    controller.cleanup();
    let watcher = Arc::clone(&controller).start().unwrap();

    let (ok, message) = send_command(stack.data_dir(), "stats").await;
    assert!(ok, "stats via controller failed: {message}");
    assert!(message.contains("Reputation"), "unexpected message: {message}");

    // The controller file now carries the response-log path, and the log
    // ends with the terminal indicator.
    let paths = ControllerPaths::new(stack.data_dir());
    let handoff = std::fs::read_to_string(&paths.controller_file).unwrap();
    assert!(handoff.trim().starts_with(&*paths.logs_dir.to_string_lossy()));
    let log = std::fs::read_to_string(handoff.trim()).unwrap();
    assert!(log.ends_with("1\n"), "log missing terminal indicator: {log:?}");

    // PID file names this process.
    let pid: u32 = std::fs::read_to_string(&paths.pid_file).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());

    watcher.abort();
    controller.cleanup();
    assert!(!paths.controller_file.exists());
    assert!(!paths.pid_file.exists());
}

#[tokio::test]
async fn controller_reports_failures() {
    let stack = offline_stack().await;
    let controller = Arc::new(
        Controller::new(stack.data_dir(), Arc::clone(&stack.dispatcher)).unwrap(),
    );
    controller.cleanup();
    let watcher = Arc::clone(&controller).start().unwrap();

    let (ok, message) = send_command(stack.data_dir(), "bogus-verb").await;
    assert!(!ok);
    assert!(message.contains("Unknown command"), "unexpected message: {message}");

    // Offline gated verb fails but still answers through the log.
    let (ok, message) = send_command(stack.data_dir(), "upload /tmp/nope.txt").await;
    assert!(!ok);
    assert!(message.contains("logged in"), "unexpected message: {message}");

    watcher.abort();
}

#[tokio::test]
async fn dispatcher_preconditions_offline() {
    let stack = offline_stack().await;
    let d = &stack.dispatcher;

    let out = d.execute("report abcd bob", ExecContext::Repl).await;
    assert!(!out.success);
    assert!(out.message.contains("logged in"));

    let out = d.execute("download abcd", ExecContext::Repl).await;
    assert!(!out.success);

    let out = d.execute("help", ExecContext::Repl).await;
    assert!(out.success);
    assert!(out.message.contains("dns-reg"));

    let out = d.execute("exit", ExecContext::Repl).await;
    assert!(out.exit);

    // Every invocation above landed in history, failures included.
    let history = d.db.recent_history(10).unwrap();
    assert!(history.len() >= 4);
    assert!(history.iter().any(|r| r.command.starts_with("report") && !r.success));
    assert!(history.iter().any(|r| r.command == "help" && r.success));
}

#[tokio::test]
async fn keys_subcommands_offline() {
    let stack = offline_stack().await;
    let d = &stack.dispatcher;

    let out = d.execute("keys show", ExecContext::Repl).await;
    assert!(out.success);
    assert!(out.message.contains("BEGIN PUBLIC KEY"));

    let export_path = stack.data_dir().join("backup.pem");
    let out = d
        .execute(&format!("keys export {}", export_path.display()), ExecContext::Repl)
        .await;
    assert!(out.success);
    assert!(export_path.exists());

    let out = d
        .execute(&format!("keys import {}", export_path.display()), ExecContext::Repl)
        .await;
    assert!(out.success, "{}", out.message);
}

#[tokio::test]
async fn servers_subcommands_offline() {
    let stack = offline_stack().await;
    let d = &stack.dispatcher;

    let out = d.execute("servers", ExecContext::Repl).await;
    assert!(out.success);
    assert!(out.message.contains("No known servers"));

    let out = d.execute("servers add http://srv:8080", ExecContext::Repl).await;
    assert!(out.success);

    let out = d.execute("servers", ExecContext::Repl).await;
    assert!(out.message.contains("http://srv:8080"));

    let out = d.execute("servers remove 1", ExecContext::Repl).await;
    assert!(out.success);
    assert!(d.db.load_known_servers().unwrap().is_empty());
}
