use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Request correlation id: millisecond timestamp prefix plus a short
/// random suffix. Sortable in logs, unique enough for correlation, and
/// carrying no request content.
pub fn new_correlation_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("req-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Truncated SHA-256 over a request payload. Lets operators group log
/// lines by identical payloads without ever persisting the payload.
pub fn payload_hash(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect()
}
