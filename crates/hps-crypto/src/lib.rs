pub mod hash;
pub mod keystore;
pub mod pow;

pub use hash::{content_hash_of, sha256, sha256_hex};
pub use keystore::{verify_with_pem, KeyStore};
pub use pow::{calibrate_hashrate, leading_zero_bits, solve_challenge, verify_pow, PowSolution};
