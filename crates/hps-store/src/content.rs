use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use tracing::debug;

use hps_core::{parse_framed, ContentMeta, HpsError};
use hps_crypto::{sha256_hex, verify_with_pem};

/// Result of re-checking a cached blob against its hash and signature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    /// SHA-256 of the file equals the content hash it is stored under.
    pub integrity_ok: bool,
    /// The stored signature verifies against the framed payload under the
    /// stored public key. False when no signature is on record.
    pub signature_ok: bool,
}

/// Blob files under `<data_dir>/content/`, one `<hash>.dat` per blob.
pub struct ContentStore {
    content_dir: PathBuf,
}

impl ContentStore {
    pub fn open(data_dir: &Path) -> Result<Self, HpsError> {
        let content_dir = data_dir.join("content");
        std::fs::create_dir_all(&content_dir)?;
        Ok(Self { content_dir })
    }

    pub fn path_for(&self, content_hash: &str) -> PathBuf {
        self.content_dir.join(format!("{content_hash}.dat"))
    }

    /// Write a blob atomically: temp file in the same directory, then rename.
    pub fn put(&self, content_hash: &str, bytes: &[u8]) -> Result<PathBuf, HpsError> {
        let final_path = self.path_for(content_hash);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.content_dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&final_path)
            .map_err(|e| HpsError::Io(e.error))?;
        debug!(hash = content_hash, size = bytes.len(), "blob stored");
        Ok(final_path)
    }

    pub fn get(&self, content_hash: &str) -> Result<Vec<u8>, HpsError> {
        Ok(std::fs::read(self.path_for(content_hash))?)
    }

    pub fn exists(&self, content_hash: &str) -> bool {
        self.path_for(content_hash).exists()
    }

    /// Enumerate `(hash, size)` of every stored blob, for `sync_client_files`.
    pub fn list(&self) -> Result<Vec<(String, u64)>, HpsError> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.content_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(hash) = name.strip_suffix(".dat") {
                out.push((hash.to_string(), entry.metadata()?.len()));
            }
        }
        Ok(out)
    }

    /// Recompute the file hash and re-check the stored signature.
    pub fn verify(&self, content_hash: &str, meta: &ContentMeta) -> Result<VerifyReport, HpsError> {
        let bytes = self.get(content_hash)?;
        let integrity_ok = sha256_hex(&bytes) == content_hash;

        let signature_ok = if meta.signature.is_empty() || meta.public_key.is_empty() {
            false
        } else {
            match (B64.decode(&meta.signature), B64.decode(&meta.public_key)) {
                (Ok(sig), Ok(pem)) => parse_framed(&bytes)
                    .map(|blob| verify_with_pem(&pem, &blob.payload, &sig).is_ok())
                    .unwrap_or(false),
                _ => false,
            }
        };

        Ok(VerifyReport { integrity_ok, signature_ok })
    }
}

/// Total size in bytes of everything under the data directory, recursively.
/// Compared against the advisory quota; nothing is ever evicted.
pub fn disk_usage(data_dir: &Path) -> u64 {
    fn walk(dir: &Path, total: &mut u64) {
        let Ok(entries) = std::fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, total);
            } else if let Ok(meta) = entry.metadata() {
                *total += meta.len();
            }
        }
    }
    let mut total = 0;
    walk(data_dir, &mut total);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use hps_core::frame_blob;
    use hps_crypto::KeyStore;

    fn keystore() -> &'static KeyStore {
        use std::sync::OnceLock;
        static KS: OnceLock<KeyStore> = OnceLock::new();
        KS.get_or_init(|| KeyStore::generate().expect("generate keypair"))
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();

        let bytes = b"framed blob bytes";
        let hash = sha256_hex(bytes);
        let path = store.put(&hash, bytes).unwrap();
        assert!(path.ends_with(format!("{hash}.dat")));
        assert!(store.exists(&hash));
        assert_eq!(store.get(&hash).unwrap(), bytes);
    }

    #[test]
    fn list_enumerates_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        store.put("aa", b"one").unwrap();
        store.put("bb", b"four").unwrap();

        let mut listed = store.list().unwrap();
        listed.sort();
        assert_eq!(listed, vec![("aa".into(), 3), ("bb".into(), 4)]);
    }

    #[test]
    fn verify_good_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        let ks = keystore();

        let payload = b"signed payload";
        let framed = frame_blob("alice", ks.public_key_pem(), payload);
        let hash = sha256_hex(&framed);
        let sig = ks.sign(payload).unwrap();

        store.put(&hash, &framed).unwrap();
        let meta = ContentMeta {
            signature: B64.encode(&sig),
            public_key: B64.encode(ks.public_key_pem()),
            ..Default::default()
        };

        let report = store.verify(&hash, &meta).unwrap();
        assert!(report.integrity_ok);
        assert!(report.signature_ok);
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        let ks = keystore();

        let framed = frame_blob("alice", ks.public_key_pem(), b"payload");
        let hash = sha256_hex(&framed);
        // Store different bytes under the claimed hash.
        store.put(&hash, b"tampered bytes").unwrap();

        let report = store.verify(&hash, &ContentMeta::default()).unwrap();
        assert!(!report.integrity_ok);
        assert!(!report.signature_ok);
    }

    #[test]
    fn disk_usage_counts_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path()).unwrap();
        store.put("aa", &[0u8; 100]).unwrap();
        std::fs::write(dir.path().join("top.bin"), [0u8; 50]).unwrap();
        assert_eq!(disk_usage(dir.path()), 150);
    }
}
