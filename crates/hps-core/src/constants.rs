//! ─── HPS Protocol Constants ─────────────────────────────────────────────────
//!
//! Limits and timing shared by every crate in the workspace.

// ── Content limits ───────────────────────────────────────────────────────────

/// Maximum raw payload size for a single upload (100 MiB).
pub const MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Advisory local disk quota for cached blobs (500 MiB). Reported in stats;
/// never enforced by eviction.
pub const DISK_QUOTA: u64 = 500 * 1024 * 1024;

// ── Proof-of-Work ────────────────────────────────────────────────────────────

/// Hard wall-clock ceiling for a single mining session.
pub const POW_HARD_LIMIT_SECS: u64 = 600;

/// Nonces between cooperative 1 ms sleeps.
pub const POW_YIELD_INTERVAL: u64 = 10_000;

/// Nonces between cancel-flag checks.
pub const POW_CANCEL_INTERVAL: u64 = 1_000;

/// Default calibration window before mining starts.
pub const POW_CALIBRATE_SECS: f64 = 0.5;

// ── Request timeouts ─────────────────────────────────────────────────────────

/// Caller timeout for PoW-gated verbs (login, upload, dns-reg, report).
pub const GATED_TIMEOUT_SECS: u64 = 300;

/// Caller timeout for single-round-trip verbs (download, search, resolve…).
pub const SIMPLE_TIMEOUT_SECS: u64 = 30;

// ── Transport ────────────────────────────────────────────────────────────────

/// Reconnection attempts after an unexpected disconnect.
pub const RECONNECT_ATTEMPTS: u32 = 5;

/// First reconnect delay in seconds; grows by one second per attempt.
pub const RECONNECT_DELAY_MIN_SECS: u64 = 1;

/// Reconnect delay cap in seconds.
pub const RECONNECT_DELAY_MAX_SECS: u64 = 5;

// ── Controller bridge ────────────────────────────────────────────────────────

/// Poll interval for the controller file and response logs.
pub const CONTROLLER_POLL_MS: u64 = 100;

/// Sender-side timeout for both the accept step and the terminal step.
pub const CONTROLLER_TIMEOUT_SECS: u64 = 300;

// ── Reputation ───────────────────────────────────────────────────────────────

/// Minimum local reputation required to issue a report.
pub const MIN_REPORT_REPUTATION: i64 = 20;

/// Reputation assumed for a fresh install before the first login.
pub const DEFAULT_REPUTATION: i64 = 100;

// ── Search ───────────────────────────────────────────────────────────────────

/// Result limit sent with every `search_content` request.
pub const SEARCH_LIMIT: u32 = 50;
