//! Raw token generation and one-way hashing.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in a raw share token (256 bits).
pub const RAW_TOKEN_BYTES: usize = 32;

/// Length of an encoded raw token: 32 bytes as unpadded base64.
pub const RAW_TOKEN_LEN: usize = 43;

/// Generate a raw share token from the OS CSPRNG, URL-safe base64 without
/// padding so it fits in a URL path segment.
pub fn generate_raw_token() -> String {
    let mut bytes = [0u8; RAW_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a raw token: SHA-256, URL-safe base64.
pub fn hash_token(raw_token: &str) -> String {
    digest_b64(raw_token.as_bytes())
}

/// Hash a client identifier (IP, user agent) for the access log.
///
/// Labelled so an IP hash can never equal a token hash.
pub fn hash_client_value(label: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"medshare:");
    hasher.update(label.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn digest_b64(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
