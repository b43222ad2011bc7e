/// Refresh Token Generation
///
/// Refresh tokens are opaque, cryptographically random strings. The
/// session cache stores only the SHA-256 hash of the token, keyed for a
/// single atomic consume; the plaintext exists nowhere but the client.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

const TOKEN_LENGTH: usize = 64;

/// Generate a new cryptographically secure refresh token.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token for storage and lookup. Plaintext tokens are
/// never written to the cache.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
