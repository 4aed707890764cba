use std::path::Path;

use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::info;

use hps_core::HpsError;

const KEY_BITS: usize = 4096;
const PRIVATE_KEY_FILE: &str = "private_key.pem";
const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// PSS salt length used for signing: the maximum the modulus allows
/// (emLen - hLen - 2). Verification recovers the salt from the signature, so
/// peers signing with other salt lengths still verify.
const SALT_LEN: usize = KEY_BITS / 8 - 32 - 2;

/// The install's long-lived RSA-4096 identity.
///
/// The private key is persisted as unencrypted PKCS#8 PEM, the public key as
/// SubjectPublicKeyInfo PEM, both in the data directory. This is a known
/// weakness of the protocol: keys are stored in the clear on local disk.
pub struct KeyStore {
    private: RsaPrivateKey,
    public_pem: String,
}

impl KeyStore {
    /// Load the keypair from `dir`, or generate and persist a fresh one when
    /// either file is missing or unreadable.
    pub fn load_or_generate(dir: &Path) -> Result<Self, HpsError> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        if private_path.exists() && public_path.exists() {
            match Self::load(&private_path) {
                Ok(ks) => {
                    info!("cryptographic keys loaded from local storage");
                    return Ok(ks);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "existing keys unreadable, regenerating");
                }
            }
        }

        let ks = Self::generate()?;
        ks.save(dir)?;
        info!("new cryptographic keys generated");
        Ok(ks)
    }

    /// Generate a fresh RSA-4096 keypair (public exponent 65537).
    pub fn generate() -> Result<Self, HpsError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| HpsError::Storage(format!("key generation failed: {e}")))?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| HpsError::Serialization(e.to_string()))?;
        Ok(Self { private, public_pem })
    }

    fn load(private_path: &Path) -> Result<Self, HpsError> {
        let pem = std::fs::read_to_string(private_path)?;
        let private = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| HpsError::Serialization(format!("bad private key PEM: {e}")))?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| HpsError::Serialization(e.to_string()))?;
        Ok(Self { private, public_pem })
    }

    /// Persist both PEM files into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), HpsError> {
        std::fs::create_dir_all(dir)?;
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| HpsError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(PRIVATE_KEY_FILE), private_pem.as_bytes())?;
        std::fs::write(dir.join(PUBLIC_KEY_FILE), self.public_pem.as_bytes())?;
        Ok(())
    }

    /// Write the private key PEM to an arbitrary path (key backup).
    pub fn export(&self, path: &Path) -> Result<(), HpsError> {
        let private_pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| HpsError::Serialization(e.to_string()))?;
        std::fs::write(path, private_pem.as_bytes())?;
        Ok(())
    }

    /// Replace the identity with a private key read from `path`. The public
    /// key is re-derived; the caller persists with [`KeyStore::save`].
    pub fn import(path: &Path) -> Result<Self, HpsError> {
        Self::load(path)
    }

    /// RSA-PSS(MGF1-SHA256, salt=MAX) signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, HpsError> {
        let signer = SigningKey::<Sha256>::new_with_salt_len(self.private.clone(), SALT_LEN);
        let sig = signer
            .try_sign_with_rng(&mut rand::thread_rng(), message)
            .map_err(|_| HpsError::InvalidSignature)?;
        Ok(sig.to_vec())
    }

    /// The public key as SubjectPublicKeyInfo PEM bytes.
    pub fn public_key_pem(&self) -> &[u8] {
        self.public_pem.as_bytes()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyStore {{ rsa-{KEY_BITS} }}")
    }
}

/// Verify an RSA-PSS signature against a public key in PEM form.
pub fn verify_with_pem(public_pem: &[u8], message: &[u8], signature: &[u8]) -> Result<(), HpsError> {
    let pem = std::str::from_utf8(public_pem).map_err(|_| HpsError::InvalidSignature)?;
    let public = RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| HpsError::Serialization(format!("bad public key PEM: {e}")))?;
    let verifier = VerifyingKey::<Sha256>::new(public);
    let sig = Signature::try_from(signature).map_err(|_| HpsError::InvalidSignature)?;
    verifier
        .verify(message, &sig)
        .map_err(|_| HpsError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RSA-4096 generation is slow; share one keypair across tests.
    fn keystore() -> &'static KeyStore {
        use std::sync::OnceLock;
        static KS: OnceLock<KeyStore> = OnceLock::new();
        KS.get_or_init(|| KeyStore::generate().expect("generate keypair"))
    }

    #[test]
    fn sign_verify_round_trip() {
        let ks = keystore();
        let msg = b"the quick brown fox";
        let sig = ks.sign(msg).unwrap();
        verify_with_pem(ks.public_key_pem(), msg, &sig).expect("signature verifies");
    }

    #[test]
    fn tampered_message_rejected() {
        let ks = keystore();
        let sig = ks.sign(b"original").unwrap();
        assert!(matches!(
            verify_with_pem(ks.public_key_pem(), b"tampered", &sig),
            Err(HpsError::InvalidSignature)
        ));
    }

    #[test]
    fn tampered_signature_rejected() {
        let ks = keystore();
        let mut sig = ks.sign(b"message").unwrap();
        sig[0] ^= 0x01;
        assert!(matches!(
            verify_with_pem(ks.public_key_pem(), b"message", &sig),
            Err(HpsError::InvalidSignature)
        ));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ks = keystore();
        ks.save(dir.path()).unwrap();

        let loaded = KeyStore::load_or_generate(dir.path()).unwrap();
        assert_eq!(loaded.public_key_pem(), ks.public_key_pem());

        let sig = loaded.sign(b"persisted identity").unwrap();
        verify_with_pem(ks.public_key_pem(), b"persisted identity", &sig).unwrap();
    }

    #[test]
    fn export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.pem");
        let ks = keystore();
        ks.export(&path).unwrap();

        let imported = KeyStore::import(&path).unwrap();
        assert_eq!(imported.public_key_pem(), ks.public_key_pem());
    }
}
