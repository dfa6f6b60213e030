// Credential store seam.
//
// Persistence lives with the host (keyring, flash, ...). The core only
// asks whether a token exists, reads it, replaces it and clears it.

use std::sync::RwLock;

use secrecy::SecretString;

/// Where the device credential lives between runs.
///
/// Implementations are best effort: a failed write is logged by the
/// implementation, and the next verification cycle sorts out the rest.
pub trait CredentialStore: Send + Sync {
    fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn credential(&self) -> Option<SecretString>;

    fn set_credential(&self, token: SecretString);

    fn clear_credential(&self);
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<SecretString>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(SecretString::from(token.into()))),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credential(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_credential(&self, token: SecretString) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token);
    }

    fn clear_credential(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}
