// Credential verifiers: check a presented credential against a trust source
// Decision: The static pair is stored only as keyed tags so comparison never short-circuits on content

use serde::Deserialize;

use crate::crypto::Signer;
use crate::error::{AuthError, Result};

/// Principal name returned by a successful verification
pub type Subject = String;

/// Checks a presented credential. Pure: no side effects.
pub trait CredentialVerifier: Send + Sync {
    type Credential: ?Sized;

    fn verify(&self, presented: &Self::Credential) -> Result<Subject>;
}

/// Username/password pair as submitted by a login form or JSON body
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl PasswordCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Verifier for a single fixed username/password pair
pub struct StaticPairVerifier {
    signer: Signer,
    username_tag: Vec<u8>,
    password_tag: Vec<u8>,
}

impl StaticPairVerifier {
    pub fn new(username: &str, password: &str) -> Result<Self> {
        let signer = Signer::random()?;
        let username_tag = signer.sign(username.as_bytes());
        let password_tag = signer.sign(password.as_bytes());
        Ok(Self {
            signer,
            username_tag,
            password_tag,
        })
    }
}

impl CredentialVerifier for StaticPairVerifier {
    type Credential = PasswordCredentials;

    fn verify(&self, presented: &PasswordCredentials) -> Result<Subject> {
        if presented.username.is_empty() && presented.password.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        // Both checks always run
        let username_ok = self
            .signer
            .verify(presented.username.as_bytes(), &self.username_tag);
        let password_ok = self
            .signer
            .verify(presented.password.as_bytes(), &self.password_tag);

        if username_ok & password_ok {
            Ok(presented.username.clone())
        } else {
            Err(AuthError::invalid("username or password mismatch"))
        }
    }
}
