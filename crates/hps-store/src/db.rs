use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use hps_core::{ContentMeta, HpsError, Timestamp, DEFAULT_REPUTATION};

/// Current wall-clock as fractional Unix seconds (REAL columns).
fn now() -> Timestamp {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn storage_err(e: rusqlite::Error) -> HpsError {
    HpsError::Storage(e.to_string())
}

// ── Row types ────────────────────────────────────────────────────────────────

/// One cached blob's metadata row.
#[derive(Debug, Clone)]
pub struct ContentRow {
    pub content_hash: String,
    pub file_path: String,
    pub file_name: String,
    pub size: i64,
    pub last_accessed: Timestamp,
    pub meta: ContentMeta,
}

#[derive(Debug, Clone)]
pub struct NetworkNodeRow {
    pub node_id: String,
    pub address: String,
    pub node_type: String,
    pub reputation: i64,
    pub status: String,
    pub last_seen: Timestamp,
}

#[derive(Debug, Clone)]
pub struct DnsRecordRow {
    pub domain: String,
    pub content_hash: String,
    pub username: String,
    pub verified: bool,
    pub timestamp: Timestamp,
    pub ddns_hash: String,
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub command: String,
    pub timestamp: Timestamp,
    pub success: bool,
    pub result: String,
}

/// Durable per-install counters, flushed on every relevant event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub session_start: i64,
    pub data_sent: i64,
    pub data_received: i64,
    pub content_downloaded: i64,
    pub content_uploaded: i64,
    pub dns_registered: i64,
    pub pow_solved: i64,
    pub pow_time: i64,
    pub content_reported: i64,
    pub hashes_calculated: i64,
}

impl Stats {
    fn entries(&self) -> [(&'static str, i64); 10] {
        [
            ("session_start", self.session_start),
            ("data_sent", self.data_sent),
            ("data_received", self.data_received),
            ("content_downloaded", self.content_downloaded),
            ("content_uploaded", self.content_uploaded),
            ("dns_registered", self.dns_registered),
            ("pow_solved", self.pow_solved),
            ("pow_time", self.pow_time),
            ("content_reported", self.content_reported),
            ("hashes_calculated", self.hashes_calculated),
        ]
    }

    fn set(&mut self, key: &str, value: i64) {
        match key {
            "session_start" => self.session_start = value,
            "data_sent" => self.data_sent = value,
            "data_received" => self.data_received = value,
            "content_downloaded" => self.content_downloaded = value,
            "content_uploaded" => self.content_uploaded = value,
            "dns_registered" => self.dns_registered = value,
            "pow_solved" => self.pow_solved = value,
            "pow_time" => self.pow_time = value,
            "content_reported" => self.content_reported = value,
            "hashes_calculated" => self.hashes_calculated = value,
            _ => {}
        }
    }
}

/// Durable slice of the session restored on startup.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub current_user: Option<String>,
    pub current_server: Option<String>,
    pub username: Option<String>,
    pub reputation: i64,
}

// ── Database ─────────────────────────────────────────────────────────────────

/// SQLite database for all client metadata.
///
/// Tables:
///   content_cache — one row per locally known blob
///   known_servers — servers successfully logged into
///   network_nodes — snapshot of the server's peer table
///   dns_records   — locally cached name resolutions
///   reports       — issued abuse reports (dedup guard)
///   history       — command log
///   session       — durable session keys (current_user, …)
///   stats         — durable counters
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HpsError> {
        let conn = Connection::open(path).map_err(storage_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(30))
            .map_err(storage_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(storage_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(storage_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(storage_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS content_cache (
                 content_hash  TEXT PRIMARY KEY,
                 file_path     TEXT NOT NULL,
                 file_name     TEXT NOT NULL,
                 mime_type     TEXT NOT NULL,
                 size          INTEGER NOT NULL,
                 last_accessed REAL NOT NULL,
                 title         TEXT,
                 description   TEXT,
                 username      TEXT,
                 signature     TEXT,
                 public_key    TEXT,
                 verified      INTEGER DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS known_servers (
                 server_address TEXT PRIMARY KEY,
                 reputation     INTEGER DEFAULT 100,
                 last_connected REAL NOT NULL,
                 is_active      INTEGER DEFAULT 1,
                 use_ssl        INTEGER DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS network_nodes (
                 node_id    TEXT PRIMARY KEY,
                 address    TEXT NOT NULL,
                 node_type  TEXT NOT NULL,
                 reputation INTEGER DEFAULT 100,
                 status     TEXT NOT NULL,
                 last_seen  REAL NOT NULL
             );
             CREATE TABLE IF NOT EXISTS dns_records (
                 domain       TEXT PRIMARY KEY,
                 content_hash TEXT NOT NULL,
                 username     TEXT NOT NULL,
                 verified     INTEGER DEFAULT 0,
                 timestamp    REAL NOT NULL,
                 ddns_hash    TEXT NOT NULL DEFAULT ''
             );
             CREATE TABLE IF NOT EXISTS reports (
                 report_id     TEXT PRIMARY KEY,
                 content_hash  TEXT NOT NULL,
                 reported_user TEXT NOT NULL,
                 reporter_user TEXT NOT NULL,
                 timestamp     REAL NOT NULL,
                 status        TEXT NOT NULL,
                 reason        TEXT
             );
             CREATE TABLE IF NOT EXISTS history (
                 id        INTEGER PRIMARY KEY AUTOINCREMENT,
                 command   TEXT NOT NULL,
                 timestamp REAL NOT NULL,
                 success   INTEGER DEFAULT 0,
                 result    TEXT
             );
             CREATE TABLE IF NOT EXISTS session (
                 key     TEXT PRIMARY KEY,
                 value   TEXT NOT NULL,
                 updated REAL NOT NULL
             );
             CREATE TABLE IF NOT EXISTS stats (
                 stat_key   TEXT PRIMARY KEY,
                 stat_value INTEGER NOT NULL,
                 updated    REAL NOT NULL
             );",
        )
        .map_err(storage_err)?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, HpsError> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        f(&conn).map_err(storage_err)
    }

    // ── content_cache ────────────────────────────────────────────────────────

    pub fn upsert_content(
        &self,
        content_hash: &str,
        file_path: &str,
        file_name: &str,
        size: i64,
        meta: &ContentMeta,
    ) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO content_cache
                 (content_hash, file_path, file_name, mime_type, size, last_accessed,
                  title, description, username, signature, public_key, verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    content_hash,
                    file_path,
                    file_name,
                    meta.mime_type,
                    size,
                    now(),
                    meta.title,
                    meta.description,
                    meta.username,
                    meta.signature,
                    meta.public_key,
                    meta.verified as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_content(&self, content_hash: &str) -> Result<Option<ContentRow>, HpsError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content_hash, file_path, file_name, mime_type, size, last_accessed,
                        title, description, username, signature, public_key, verified
                 FROM content_cache WHERE content_hash = ?1",
                params![content_hash],
                |row| {
                    Ok(ContentRow {
                        content_hash: row.get(0)?,
                        file_path: row.get(1)?,
                        file_name: row.get(2)?,
                        size: row.get(4)?,
                        last_accessed: row.get(5)?,
                        meta: ContentMeta {
                            mime_type: row.get(3)?,
                            title: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                            description: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                            username: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                            signature: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                            public_key: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
                            verified: row.get::<_, i64>(11)? != 0,
                        },
                    })
                },
            )
            .optional()
        })
    }

    // ── known_servers ────────────────────────────────────────────────────────

    pub fn load_known_servers(&self) -> Result<Vec<String>, HpsError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT server_address FROM known_servers WHERE is_active = 1
                 ORDER BY last_connected DESC",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
    }

    pub fn save_known_server(&self, address: &str) -> Result<(), HpsError> {
        let use_ssl = address.starts_with("https://") as i64;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO known_servers
                 (server_address, last_connected, is_active, use_ssl)
                 VALUES (?1, ?2, 1, ?3)",
                params![address, now(), use_ssl],
            )?;
            Ok(())
        })
    }

    pub fn remove_known_server(&self, address: &str) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM known_servers WHERE server_address = ?1",
                params![address],
            )?;
            Ok(())
        })
    }

    // ── network_nodes ────────────────────────────────────────────────────────

    pub fn upsert_network_node(&self, node: &NetworkNodeRow) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO network_nodes
                 (node_id, address, node_type, reputation, status, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    node.node_id,
                    node.address,
                    node.node_type,
                    node.reputation,
                    node.status,
                    node.last_seen,
                ],
            )?;
            Ok(())
        })
    }

    pub fn recent_network_nodes(&self, limit: u32) -> Result<Vec<NetworkNodeRow>, HpsError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT node_id, address, node_type, reputation, status, last_seen
                 FROM network_nodes ORDER BY last_seen DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(NetworkNodeRow {
                    node_id: row.get(0)?,
                    address: row.get(1)?,
                    node_type: row.get(2)?,
                    reputation: row.get(3)?,
                    status: row.get(4)?,
                    last_seen: row.get(5)?,
                })
            })?;
            rows.collect()
        })
    }

    // ── dns_records ──────────────────────────────────────────────────────────

    pub fn upsert_dns_record(&self, rec: &DnsRecordRow) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO dns_records
                 (domain, content_hash, username, verified, timestamp, ddns_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rec.domain,
                    rec.content_hash,
                    rec.username,
                    rec.verified as i64,
                    rec.timestamp,
                    rec.ddns_hash,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_dns_record(&self, domain: &str) -> Result<Option<DnsRecordRow>, HpsError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT domain, content_hash, username, verified, timestamp, ddns_hash
                 FROM dns_records WHERE domain = ?1",
                params![domain],
                |row| {
                    Ok(DnsRecordRow {
                        domain: row.get(0)?,
                        content_hash: row.get(1)?,
                        username: row.get(2)?,
                        verified: row.get::<_, i64>(3)? != 0,
                        timestamp: row.get(4)?,
                        ddns_hash: row.get(5)?,
                    })
                },
            )
            .optional()
        })
    }

    // ── reports ──────────────────────────────────────────────────────────────

    /// Dedup guard: has this reporter already reported this hash?
    pub fn has_report(&self, reporter: &str, content_hash: &str) -> Result<bool, HpsError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reports
                 WHERE reporter_user = ?1 AND content_hash = ?2",
                params![reporter, content_hash],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn insert_report(
        &self,
        report_id: &str,
        content_hash: &str,
        reported_user: &str,
        reporter: &str,
    ) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports
                 (report_id, content_hash, reported_user, reporter_user, timestamp, status, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', '')",
                params![report_id, content_hash, reported_user, reporter, now()],
            )?;
            Ok(())
        })
    }

    // ── history ──────────────────────────────────────────────────────────────

    pub fn append_history(&self, command: &str, success: bool, result: &str) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO history (command, timestamp, success, result)
                 VALUES (?1, ?2, ?3, ?4)",
                params![command, now(), success as i64, result],
            )?;
            Ok(())
        })
    }

    pub fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRow>, HpsError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT command, timestamp, success, result
                 FROM history ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(HistoryRow {
                    command: row.get(0)?,
                    timestamp: row.get(1)?,
                    success: row.get::<_, i64>(2)? != 0,
                    result: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?;
            rows.collect()
        })
    }

    // ── session / stats ──────────────────────────────────────────────────────

    pub fn load_session(&self) -> Result<SessionSnapshot, HpsError> {
        let entries: HashMap<String, String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM session")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;

        let non_empty = |k: &str| entries.get(k).filter(|v| !v.is_empty()).cloned();
        Ok(SessionSnapshot {
            current_user: non_empty("current_user"),
            current_server: non_empty("current_server"),
            username: non_empty("username"),
            reputation: entries
                .get("reputation")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REPUTATION),
        })
    }

    pub fn save_session(&self, snap: &SessionSnapshot) -> Result<(), HpsError> {
        let entries = [
            ("current_user", snap.current_user.clone().unwrap_or_default()),
            ("current_server", snap.current_server.clone().unwrap_or_default()),
            ("username", snap.username.clone().unwrap_or_default()),
            ("reputation", snap.reputation.to_string()),
        ];
        self.with_conn(|conn| {
            for (key, value) in &entries {
                conn.execute(
                    "INSERT OR REPLACE INTO session (key, value, updated) VALUES (?1, ?2, ?3)",
                    params![key, value, now()],
                )?;
            }
            Ok(())
        })
    }

    pub fn load_stats(&self) -> Result<Stats, HpsError> {
        let mut stats = Stats::default();
        let entries: Vec<(String, i64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT stat_key, stat_value FROM stats")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;
        for (key, value) in entries {
            stats.set(&key, value);
        }
        Ok(stats)
    }

    pub fn save_stats(&self, stats: &Stats) -> Result<(), HpsError> {
        self.with_conn(|conn| {
            for (key, value) in stats.entries() {
                conn.execute(
                    "INSERT OR REPLACE INTO stats (stat_key, stat_value, updated)
                     VALUES (?1, ?2, ?3)",
                    params![key, value, now()],
                )?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path().join("hps_cli.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn content_round_trip() {
        let (_dir, db) = open_db();
        let meta = ContentMeta {
            title: "t".into(),
            description: "d".into(),
            mime_type: "text/plain".into(),
            username: "alice".into(),
            signature: "sig".into(),
            public_key: "key".into(),
            verified: true,
        };
        db.upsert_content("abcd", "/tmp/abcd.dat", "abcd.dat", 42, &meta)
            .unwrap();

        let row = db.get_content("abcd").unwrap().expect("row exists");
        assert_eq!(row.size, 42);
        assert_eq!(row.meta.username, "alice");
        assert!(row.meta.verified);
        assert!(db.get_content("missing").unwrap().is_none());
    }

    #[test]
    fn report_dedup_guard() {
        let (_dir, db) = open_db();
        assert!(!db.has_report("alice", "h1").unwrap());
        db.insert_report("r1", "h1", "bob", "alice").unwrap();
        assert!(db.has_report("alice", "h1").unwrap());
        assert!(!db.has_report("alice", "h2").unwrap());
        assert!(!db.has_report("carol", "h1").unwrap());
    }

    #[test]
    fn session_state_round_trip() {
        let (_dir, db) = open_db();
        // Fresh DB: defaults.
        let snap = db.load_session().unwrap();
        assert!(snap.current_user.is_none());
        assert_eq!(snap.reputation, DEFAULT_REPUTATION);

        let saved = SessionSnapshot {
            current_user: Some("alice".into()),
            current_server: Some("http://srv:8080".into()),
            username: Some("alice".into()),
            reputation: 87,
        };
        db.save_session(&saved).unwrap();

        let loaded = db.load_session().unwrap();
        assert_eq!(loaded.current_user.as_deref(), Some("alice"));
        assert_eq!(loaded.reputation, 87);

        // Logout writes empty strings; load maps them back to None.
        db.save_session(&SessionSnapshot { reputation: 87, ..Default::default() })
            .unwrap();
        assert!(db.load_session().unwrap().current_user.is_none());
    }

    #[test]
    fn stats_round_trip() {
        let (_dir, db) = open_db();
        let mut stats = db.load_stats().unwrap();
        stats.pow_solved += 1;
        stats.data_received += 1024;
        db.save_stats(&stats).unwrap();

        let loaded = db.load_stats().unwrap();
        assert_eq!(loaded.pow_solved, 1);
        assert_eq!(loaded.data_received, 1024);
    }

    #[test]
    fn history_ordering() {
        let (_dir, db) = open_db();
        db.append_history("login srv alice ***", true, "ok").unwrap();
        db.append_history("upload a.txt", false, "timeout").unwrap();
        let rows = db.recent_history(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.command.starts_with("login") && r.success));
        assert!(rows.iter().any(|r| r.command.starts_with("upload") && !r.success));
    }

    #[test]
    fn known_servers_round_trip() {
        let (_dir, db) = open_db();
        db.save_known_server("http://a:8080").unwrap();
        db.save_known_server("https://b:8443").unwrap();
        let servers = db.load_known_servers().unwrap();
        assert_eq!(servers.len(), 2);
        db.remove_known_server("http://a:8080").unwrap();
        assert_eq!(db.load_known_servers().unwrap(), vec!["https://b:8443"]);
    }
}
