//! Signing tokens for crop paths.
//!
//! When a signing key is configured every crop URL must carry a `token` query
//! parameter. The token binds the key to the relative crop path so that
//! clients cannot mint new crop sizes on their own:
//!
//! ```text
//! token = hex(HMAC-SHA256(signing_key, "photos/cat-200x100.jpg"))
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Secret used to compute and check crop tokens.
#[derive(Clone)]
pub struct SigningKey {
    secret_key: Vec<u8>,
}

impl SigningKey {
    /// Create a signing key from raw secret bytes.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Compute the hex-encoded token for a relative crop path.
    pub fn token(&self, path: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(path.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a supplied token against the expected one.
    ///
    /// Equality is exact; the comparison runs in constant time.
    pub fn verify(&self, path: &str, supplied: &str) -> bool {
        let expected = self.token(path);
        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}
