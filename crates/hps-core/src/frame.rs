//! Framed-blob and DDNS document construction.
//!
//! Every blob on the wire and on disk is prefixed with a fixed header that
//! carries the author's username and public key. The content hash covers the
//! framed form (header + payload); the author signature covers the raw
//! payload only.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

const HEADER_MAGIC: &str = "# HSYST P2P SERVICE### START:# USER: ";
const HEADER_KEY: &str = "# KEY: ";
const HEADER_END: &str = "### :END START";
const DNS_OPEN: &str = "### DNS:# DNAME: ";
const DNS_CLOSE: &str = "### :END DNS";

/// Prefix `payload` with the author header. The result is the canonical wire
/// and on-disk form; SHA-256 over it is the blob's content hash.
pub fn frame_blob(username: &str, public_key_pem: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 256);
    framed.extend_from_slice(HEADER_MAGIC.as_bytes());
    framed.extend_from_slice(username.as_bytes());
    framed.extend_from_slice(HEADER_KEY.as_bytes());
    framed.extend_from_slice(B64.encode(public_key_pem).as_bytes());
    framed.extend_from_slice(HEADER_END.as_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// A framed blob split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlob {
    pub username: String,
    /// Decoded public-key PEM bytes from the header.
    pub public_key_pem: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Split a framed blob into header fields and raw payload. Returns None when
/// the header layout does not match.
pub fn parse_framed(blob: &[u8]) -> Option<ParsedBlob> {
    // The header is pure ASCII; the payload may not be UTF-8, so scan only
    // the longest valid prefix of a bounded window.
    let window = &blob[..blob.len().min(8192)];
    let head = match std::str::from_utf8(window) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&window[..e.valid_up_to()]).unwrap_or(""),
    };

    let rest = head.strip_prefix(HEADER_MAGIC)?;
    let key_at = rest.find(HEADER_KEY)?;
    let username = &rest[..key_at];
    let after_key = &rest[key_at + HEADER_KEY.len()..];
    let end_at = after_key.find(HEADER_END)?;
    let key_b64 = &after_key[..end_at];
    let public_key_pem = B64.decode(key_b64).ok()?;

    let header_len =
        HEADER_MAGIC.len() + key_at + HEADER_KEY.len() + end_at + HEADER_END.len();
    Some(ParsedBlob {
        username: username.to_string(),
        public_key_pem,
        payload: blob[header_len..].to_vec(),
    })
}

/// Build the DDNS document binding `domain` to `content_hash` under the
/// author's key. The registration signature covers this whole document.
pub fn ddns_document(
    username: &str,
    public_key_pem: &[u8],
    domain: &str,
    content_hash: &str,
) -> Vec<u8> {
    let mut doc = Vec::with_capacity(512);
    doc.extend_from_slice(HEADER_MAGIC.as_bytes());
    doc.extend_from_slice(username.as_bytes());
    doc.extend_from_slice(HEADER_KEY.as_bytes());
    doc.extend_from_slice(B64.encode(public_key_pem).as_bytes());
    doc.extend_from_slice(HEADER_END.as_bytes());
    doc.extend_from_slice(DNS_OPEN.as_bytes());
    doc.extend_from_slice(domain.as_bytes());
    doc.extend_from_slice(b" = ");
    doc.extend_from_slice(content_hash.as_bytes());
    doc.extend_from_slice(DNS_CLOSE.as_bytes());
    doc
}

/// Registered names: lowercase labels of `[a-z0-9-]` separated by dots.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let pem = b"-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----\n";
        let framed = frame_blob("alice", pem, b"hello world");
        let parsed = parse_framed(&framed).expect("parse framed blob");
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.public_key_pem, pem);
        assert_eq!(parsed.payload, b"hello world");
    }

    #[test]
    fn frame_binary_payload() {
        let payload: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        let framed = frame_blob("bob", b"pem-bytes", &payload);
        let parsed = parse_framed(&framed).unwrap();
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_framed(b"not a framed blob").is_none());
        assert!(parse_framed(b"").is_none());
    }

    #[test]
    fn ddns_layout() {
        let doc = ddns_document("alice", b"pem", "example", "ff00");
        let text = String::from_utf8(doc).unwrap();
        assert!(text.starts_with("# HSYST P2P SERVICE### START:# USER: alice"));
        assert!(text.contains("### DNS:# DNAME: example = ff00### :END DNS"));
    }

    #[test]
    fn domain_validation() {
        assert!(is_valid_domain("a.b-c"));
        assert!(is_valid_domain("example"));
        assert!(is_valid_domain("my-site.v2"));
        assert!(!is_valid_domain("Upper.case"));
        assert!(!is_valid_domain("under_score"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("double..dot"));
        assert!(!is_valid_domain(".leading"));
    }
}
