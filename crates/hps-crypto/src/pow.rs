//! Proof-of-work mining.
//!
//! The server gates privileged requests behind a partial-preimage search:
//! find a nonce such that SHA-256(challenge ‖ uint64_be(nonce)) has at least
//! `target_bits` leading zero bits. Mining runs on a dedicated blocking
//! worker; the search starts at nonce 0 and increments monotonically so a
//! given (challenge, target) always yields the same winning nonce.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use sha2::{Digest, Sha256};
use tracing::debug;

use hps_core::{
    HpsError, POW_CALIBRATE_SECS, POW_CANCEL_INTERVAL, POW_HARD_LIMIT_SECS, POW_YIELD_INTERVAL,
};

/// A successful mining run, reported back to the server for difficulty
/// feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct PowSolution {
    pub nonce: u64,
    pub hashrate_observed: f64,
    pub total_hashes: u64,
    pub elapsed: f64,
}

/// Mining progress snapshot, published at >= 1 s intervals.
#[derive(Debug, Clone, Copy)]
pub struct PowProgress {
    pub nonce: u64,
    pub elapsed: f64,
    pub hashrate: f64,
    pub total_hashes: u64,
    /// The server's expected solve time, for percent-style displays.
    pub target_seconds: f64,
}

/// Count leading zero bits of a SHA-256 digest, byte-wise.
pub fn leading_zero_bits(hash: &[u8; 32]) -> u32 {
    let mut count = 0u32;
    for byte in hash {
        let lz = byte.leading_zeros();
        count += lz;
        if lz < 8 {
            break;
        }
    }
    count
}

fn pow_hash(challenge: &[u8], nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

/// Verify that a nonce satisfies the target. Used by tests and by integrity
/// checks before submitting a solution.
pub fn verify_pow(challenge: &[u8], nonce: u64, target_bits: u32) -> bool {
    leading_zero_bits(&pow_hash(challenge, nonce)) >= target_bits
}

/// Measure the local SHA-256 rate over a wall-clock window, hashing a fresh
/// random 16-byte message. Returns hashes per second.
pub fn calibrate_hashrate(window: Duration) -> f64 {
    let message: [u8; 16] = rand::random();
    let start = Instant::now();
    let mut nonce = 0u64;
    let mut count = 0u64;

    while start.elapsed() < window {
        let _ = pow_hash(&message, nonce);
        nonce += 1;
        count += 1;
    }

    let elapsed = window.as_secs_f64();
    if elapsed > 0.0 {
        count as f64 / elapsed
    } else {
        0.0
    }
}

/// Search for a nonce satisfying `target_bits`, starting from 0.
///
/// Sleeps 1 ms every 10 000 nonces to yield the core, checks `cancel` every
/// 1000 nonces, and aborts at the 600 s hard ceiling. Returns `Ok(None)` on
/// timeout or cancellation; the caller decides how to surface that.
/// `target_seconds` is the server's expected solve time, used only to scale
/// the progress display.
pub fn solve_challenge(
    challenge_b64: &str,
    target_bits: u32,
    target_seconds: f64,
    cancel: &AtomicBool,
    mut progress: impl FnMut(PowProgress),
) -> Result<Option<PowSolution>, HpsError> {
    let challenge = B64
        .decode(challenge_b64)
        .map_err(|_| HpsError::InvalidArgument("challenge is not valid base64".into()))?;

    let start = Instant::now();
    let hard_limit = Duration::from_secs(POW_HARD_LIMIT_SECS);

    // Seed the observed rate with a short calibration run so an early win
    // still reports a meaningful hashrate.
    let mut current_hashrate = calibrate_hashrate(Duration::from_secs_f64(POW_CALIBRATE_SECS));
    debug!(hashrate = current_hashrate as u64, "estimated hashrate");

    let mut nonce = 0u64;
    let mut total_hashes = 0u64;
    let mut last_report = Instant::now();
    let mut window_hashes = 0u64;

    loop {
        if start.elapsed() >= hard_limit {
            debug!(nonce, "mining hit the hard time ceiling");
            return Ok(None);
        }

        let hash = pow_hash(&challenge, nonce);
        total_hashes += 1;
        window_hashes += 1;

        if leading_zero_bits(&hash) >= target_bits {
            return Ok(Some(PowSolution {
                nonce,
                hashrate_observed: current_hashrate,
                total_hashes,
                elapsed: start.elapsed().as_secs_f64(),
            }));
        }

        let since_report = last_report.elapsed();
        if since_report >= Duration::from_secs(1) {
            current_hashrate = window_hashes as f64 / since_report.as_secs_f64();
            window_hashes = 0;
            last_report = Instant::now();
            progress(PowProgress {
                nonce,
                elapsed: start.elapsed().as_secs_f64(),
                hashrate: current_hashrate,
                total_hashes,
                target_seconds,
            });
        }

        nonce += 1;

        if nonce % POW_YIELD_INTERVAL == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        if nonce % POW_CANCEL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!(nonce, "mining cancelled");
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_target_satisfied_by_nonce_zero() {
        let challenge = B64.encode(b"anything");
        let cancel = AtomicBool::new(false);
        let sol = solve_challenge(&challenge, 0, 1.0, &cancel, |_| {})
            .unwrap()
            .expect("target 0 always solvable");
        assert_eq!(sol.nonce, 0);
        assert_eq!(sol.total_hashes, 1);
    }

    #[test]
    fn easy_target_solves_quickly() {
        let challenge = B64.encode(b"test challenge");
        let cancel = AtomicBool::new(false);
        let sol = solve_challenge(&challenge, 8, 1.0, &cancel, |_| {})
            .unwrap()
            .expect("8-bit target solvable");
        assert!(verify_pow(b"test challenge", sol.nonce, 8));
        assert!(!verify_pow(b"test challenge", sol.nonce, 32));
    }

    #[test]
    fn twenty_bit_target_within_bound() {
        let challenge = b"bounded search";
        let mut found = None;
        for nonce in 0..(1u64 << 24) {
            if verify_pow(challenge, nonce, 20) {
                found = Some(nonce);
                break;
            }
        }
        assert!(found.is_some(), "20-bit target should fall within 2^24 nonces");
    }

    #[test]
    fn cancel_stops_search() {
        // An impossible target with the cancel flag pre-set returns None fast.
        let challenge = B64.encode(b"never");
        let cancel = AtomicBool::new(true);
        let out = solve_challenge(&challenge, 255, 1.0, &cancel, |_| {}).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn leading_zeros_correct() {
        let mut hash = [0u8; 32];
        hash[0] = 0b0000_1111;
        assert_eq!(leading_zero_bits(&hash), 4);

        let mut hash2 = [0u8; 32];
        hash2[0] = 0b0000_0001;
        assert_eq!(leading_zero_bits(&hash2), 7);

        let all_zero = [0u8; 32];
        assert_eq!(leading_zero_bits(&all_zero), 256);
    }

    #[test]
    fn rejected_base64_challenge() {
        let cancel = AtomicBool::new(false);
        assert!(solve_challenge("%%%", 0, 1.0, &cancel, |_| {}).is_err());
    }

    #[test]
    fn calibration_reports_positive_rate() {
        let rate = calibrate_hashrate(Duration::from_millis(50));
        assert!(rate > 0.0);
    }
}
