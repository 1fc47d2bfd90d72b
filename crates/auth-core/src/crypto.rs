// Keyed signing and random identifiers
// Decision: HMAC-SHA256 for every integrity check; tag comparison goes through Mac::verify_slice (constant time)

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Generate a random identifier string (32 hex characters)
pub fn generate_random_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// Generate a random 256-bit secret, hex encoded
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// HMAC-SHA256 signer holding an immutable key
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(AuthError::internal("signing key is empty"));
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AuthError::internal(format!("invalid signing key: {}", e)))?;
        Ok(Self { mac })
    }

    /// Signer over a freshly generated random key
    pub fn random() -> Result<Self> {
        let key: [u8; 32] = rand::thread_rng().gen();
        Self::new(&key)
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Constant-time check of `tag` against the signature of `data`
    pub fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(tag).is_ok()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signer(..)")
    }
}
