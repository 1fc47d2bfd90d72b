// Static API key set for programmatic access
// Decision: Keys are held by SHA-256 digest only, never in clear
// Decision: The whole set can be swapped at once for hot reload; readers never see a partial set

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{AuthError, Result};
use crate::verifier::{CredentialVerifier, Subject};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Hash an API key for storage/lookup
pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}

/// Set of API key records (`digest -> active`)
#[derive(Debug, Default)]
pub struct ApiKeySet {
    keys: RwLock<HashMap<String, bool>>,
}

impl ApiKeySet {
    /// Build a set where every given key is active
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::default();
        set.replace(keys.into_iter().map(|k| (k.as_ref().to_string(), true)));
        set
    }

    /// Parse a comma-separated key list; whitespace is trimmed and empty entries skipped
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(',').map(str::trim).filter(|k| !k.is_empty()))
    }

    /// Add or update a single record
    pub fn insert(&self, key: &str, active: bool) {
        self.keys.write().insert(hash_api_key(key), active);
    }

    /// Replace every record at once
    pub fn replace<I>(&self, records: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let fresh: HashMap<String, bool> = records
            .into_iter()
            .map(|(key, active)| (hash_api_key(&key), active))
            .collect();
        *self.keys.write() = fresh;
        tracing::info!(keys = self.len(), "API key set loaded");
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl CredentialVerifier for ApiKeySet {
    type Credential = str;

    fn verify(&self, presented: &str) -> Result<Subject> {
        if presented.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let digest = hash_api_key(presented);
        match self.keys.read().get(&digest) {
            Some(true) => Ok(format!("key-{}", &digest[..12])),
            Some(false) => Err(AuthError::invalid("missing or invalid key: inactive")),
            None => Err(AuthError::invalid("missing or invalid key")),
        }
    }
}
