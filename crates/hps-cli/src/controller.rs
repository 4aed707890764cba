//! Controller-file IPC bridge.
//!
//! A sibling process drives the running interactive instance through one
//! well-known file. The sender writes a command line into the controller
//! file; the watcher answers by overwriting it with the path of a fresh
//! response log, executes the verb, and finishes the log with a terminal
//! indicator line. Log layout:
//!
//!   line 1: "1" while running, final "1"/"0" for success/failure
//!   line 2: human-readable message (newlines flattened)
//!   line 3: terminal indicator "1"/"0"

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hps_core::{CONTROLLER_POLL_MS, CONTROLLER_TIMEOUT_SECS};

use crate::commands::{CommandOutput, Dispatcher, ExecContext};

const CONTROLLER_FILE: &str = "controller_hpscli";
const PID_FILE: &str = "controller.pid";
const LOGS_DIR: &str = "logs";

/// Well-known paths of the bridge, derived from the data directory.
#[derive(Debug, Clone)]
pub struct ControllerPaths {
    pub controller_file: PathBuf,
    pub pid_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl ControllerPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            controller_file: data_dir.join(CONTROLLER_FILE),
            pid_file: data_dir.join(PID_FILE),
            logs_dir: data_dir.join(LOGS_DIR),
        }
    }
}

pub struct Controller {
    paths: ControllerPaths,
    dispatcher: Arc<Dispatcher>,
    // One controller command at a time.
    command_lock: Mutex<()>,
}

impl Controller {
    pub fn new(data_dir: &Path, dispatcher: Arc<Dispatcher>) -> std::io::Result<Self> {
        let paths = ControllerPaths::new(data_dir);
        std::fs::create_dir_all(&paths.logs_dir)?;
        Ok(Self { paths, dispatcher, command_lock: Mutex::new(()) })
    }

    /// Startup and shutdown cleanup: signal any stale owner, then remove the
    /// controller file (and the log it points to) and empty the log
    /// directory. Must run before the watcher starts: the watcher treats
    /// any observed mtime as new, so a surviving controller file would be
    /// replayed as a command.
    pub fn cleanup(&self) {
        if let Ok(text) = std::fs::read_to_string(&self.paths.pid_file) {
            if let Ok(pid) = text.trim().parse::<u32>() {
                if pid != std::process::id() {
                    let _ = std::process::Command::new("kill")
                        .arg(pid.to_string())
                        .status();
                }
            }
            let _ = std::fs::remove_file(&self.paths.pid_file);
        }

        if let Ok(content) = std::fs::read_to_string(&self.paths.controller_file) {
            let content = content.trim();
            if content.starts_with(&*self.paths.logs_dir.to_string_lossy()) {
                let _ = std::fs::remove_file(content);
            }
        }
        let _ = std::fs::remove_file(&self.paths.controller_file);

        if let Ok(entries) = std::fs::read_dir(&self.paths.logs_dir) {
            for entry in entries.flatten() {
                if entry.path().is_file() {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }

    /// Write our PID and start the watcher task. Returns a handle that stops
    /// the watcher when aborted.
    pub fn start(self: Arc<Self>) -> std::io::Result<tokio::task::JoinHandle<()>> {
        std::fs::write(&self.paths.pid_file, std::process::id().to_string())?;
        info!(file = %self.paths.controller_file.display(), "controller file monitor started");
        Ok(tokio::spawn(self.watch()))
    }

    async fn watch(self: Arc<Self>) {
        let logs_prefix = self.paths.logs_dir.to_string_lossy().into_owned();
        let mut last_modified: Option<SystemTime> = None;

        loop {
            tokio::time::sleep(Duration::from_millis(CONTROLLER_POLL_MS)).await;

            let Ok(meta) = std::fs::metadata(&self.paths.controller_file) else {
                continue;
            };
            let Ok(mtime) = meta.modified() else { continue };
            if last_modified.is_some_and(|seen| mtime <= seen) {
                continue;
            }
            last_modified = Some(mtime);

            let content = std::fs::read_to_string(&self.paths.controller_file)
                .unwrap_or_default()
                .trim()
                .to_string();
            if content.is_empty() || content.starts_with(&logs_prefix) {
                continue;
            }

            info!(command = %content, "received command from controller");
            let command_id = Uuid::new_v4();
            let log_file = self.paths.logs_dir.join(format!("{command_id}.log"));
            if let Err(e) =
                std::fs::write(&self.paths.controller_file, log_file.to_string_lossy().as_bytes())
            {
                warn!(error = %e, "failed to hand out response log path");
                continue;
            }

            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.execute_with_log(&content, &log_file).await;
            });
        }
    }

    async fn execute_with_log(&self, command: &str, log_file: &Path) {
        let _guard = self.command_lock.lock().await;

        if let Err(e) = std::fs::write(log_file, "1\nCommand execution started\n") {
            warn!(error = %e, "failed to open response log");
            return;
        }

        // dns-res rides the host session; hand it the host's user.
        let host_user = self
            .dispatcher
            .client
            .snapshot()
            .await
            .ok()
            .and_then(|s| s.current_user);
        let output = self
            .dispatcher
            .execute(command, ExecContext::Controller { host_user })
            .await;

        if let Err(e) = std::fs::write(log_file, render_log(&output)) {
            warn!(error = %e, "failed to finish response log");
        }
        debug!(command, success = output.success, "controller command finished");
    }
}

/// Final three-line log body. Messages are flattened to one line so the
/// terminal indicator always lands on line 3.
fn render_log(output: &CommandOutput) -> String {
    let status = if output.success { "1" } else { "0" };
    let message = output.message.replace('\n', " | ");
    format!("{status}\n{message}\n{status}\n")
}

/// Sender side: submit a command line to a running interactive instance and
/// wait for its result. Used by a non-interactive sibling process.
pub async fn send_command(data_dir: &Path, command_line: &str) -> (bool, String) {
    let paths = ControllerPaths::new(data_dir);
    let logs_prefix = paths.logs_dir.to_string_lossy().into_owned();
    let poll = Duration::from_millis(CONTROLLER_POLL_MS);
    let timeout = Duration::from_secs(CONTROLLER_TIMEOUT_SECS);

    if let Err(e) = std::fs::write(&paths.controller_file, command_line.trim()) {
        return (false, format!("Write controller error: {e}"));
    }

    // Accept step: the watcher replaces our command with a log path.
    let deadline = tokio::time::Instant::now() + timeout;
    let log_file = loop {
        if tokio::time::Instant::now() >= deadline {
            return (false, "Timeout waiting for log file creation".into());
        }
        if let Ok(content) = std::fs::read_to_string(&paths.controller_file) {
            let content = content.trim();
            if content.starts_with(&logs_prefix) {
                break PathBuf::from(content);
            }
        }
        tokio::time::sleep(poll).await;
    };

    // Terminal step: line 3 of the log decides the outcome.
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::time::Instant::now() >= deadline {
            return (false, "Timeout waiting for command execution".into());
        }
        if let Ok(text) = std::fs::read_to_string(&log_file) {
            let lines: Vec<&str> = text.lines().collect();
            let status = lines.first().copied().unwrap_or("");
            let message = lines.get(1).copied().unwrap_or("").to_string();
            match (status, lines.get(2).copied()) {
                ("1", Some(terminal)) => {
                    let ok = terminal == "1";
                    let fallback = if ok {
                        "Command executed successfully"
                    } else {
                        "Command failed"
                    };
                    return (ok, if message.is_empty() { fallback.into() } else { message });
                }
                ("0", Some(_)) => {
                    let fallback = "Command failed".to_string();
                    return (false, if message.is_empty() { fallback } else { message });
                }
                _ => {}
            }
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_rendering() {
        let ok = CommandOutput {
            success: true,
            message: "line one\nline two".into(),
            ..Default::default()
        };
        assert_eq!(render_log(&ok), "1\nline one | line two\n1\n");

        let fail = CommandOutput { success: false, message: "boom".into(), ..Default::default() };
        assert_eq!(render_log(&fail), "0\nboom\n0\n");
    }

    #[test]
    fn paths_derive_from_data_dir() {
        let p = ControllerPaths::new(Path::new("/tmp/hps"));
        assert_eq!(p.controller_file, Path::new("/tmp/hps/controller_hpscli"));
        assert_eq!(p.pid_file, Path::new("/tmp/hps/controller.pid"));
        assert_eq!(p.logs_dir, Path::new("/tmp/hps/logs"));
    }
}
