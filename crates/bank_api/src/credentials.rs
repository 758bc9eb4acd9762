//! Secure-at-rest storage of the single bearer credential.
//!
//! The storage mechanics are an external capability with a narrow contract:
//! callers must treat [`CredentialError::NotFound`] as a normal state (it
//! gates whether sync can run at all), not as a failure.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no credential stored")]
    NotFound,
    #[error("credential store failure: {0}")]
    Storage(String),
    #[error("device authentication failed")]
    AuthFailed,
    #[error("device authentication unavailable")]
    GateUnavailable,
}

/// At-rest storage for the bearer credential, optionally gated by a device
/// authentication factor.
pub trait TokenStore: Send + Sync {
    fn store(&self, token: &str) -> Result<(), CredentialError>;
    /// `use_gate` requests the device authentication factor before release.
    fn retrieve(&self, use_gate: bool) -> Result<String, CredentialError>;
    fn delete(&self) -> Result<(), CredentialError>;
    fn exists(&self) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// File-backed store. No device gate is available for plain files, so
/// `retrieve(true)` reports the gate as unavailable.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(err: std::io::Error) -> CredentialError {
        CredentialError::Storage(err.to_string())
    }
}

impl TokenStore for FileTokenStore {
    fn store(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = Path::new(&self.path).parent() {
            fs::create_dir_all(parent).map_err(Self::io_err)?;
        }
        let payload = serde_json::to_string_pretty(&TokenFile {
            token: token.to_string(),
        })
        .map_err(|err| CredentialError::Storage(err.to_string()))?;
        fs::write(&self.path, payload).map_err(Self::io_err)
    }

    fn retrieve(&self, use_gate: bool) -> Result<String, CredentialError> {
        if use_gate {
            return Err(CredentialError::GateUnavailable);
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound);
            }
            Err(err) => return Err(Self::io_err(err)),
        };
        let file: TokenFile = serde_json::from_str(&content)
            .map_err(|err| CredentialError::Storage(err.to_string()))?;
        Ok(file.token)
    }

    fn delete(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_err(err)),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory store for tests and ephemeral wiring.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: Mutex::new(token.map(|t| t.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn store(&self, token: &str) -> Result<(), CredentialError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| CredentialError::Storage("poisoned lock".to_string()))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn retrieve(&self, _use_gate: bool) -> Result<String, CredentialError> {
        let guard = self
            .token
            .lock()
            .map_err(|_| CredentialError::Storage("poisoned lock".to_string()))?;
        guard.clone().ok_or(CredentialError::NotFound)
    }

    fn delete(&self) -> Result<(), CredentialError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| CredentialError::Storage("poisoned lock".to_string()))?;
        *guard = None;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.token.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bank_api_{}_{}.json", std::process::id(), name))
    }

    #[test]
    fn missing_file_reports_not_found() {
        let store = FileTokenStore::new(scratch_path("missing"));
        assert!(!store.exists());
        assert_eq!(store.retrieve(false), Err(CredentialError::NotFound));
    }

    #[test]
    fn file_store_roundtrip_and_delete() {
        let store = FileTokenStore::new(scratch_path("roundtrip"));
        store.store("up:demo:token").unwrap();
        assert!(store.exists());
        assert_eq!(store.retrieve(false).unwrap(), "up:demo:token");
        store.delete().unwrap();
        assert!(!store.exists());
        // Deleting an absent credential is fine.
        store.delete().unwrap();
    }

    #[test]
    fn file_store_has_no_device_gate() {
        let store = FileTokenStore::new(scratch_path("gated"));
        store.store("tok").unwrap();
        assert_eq!(store.retrieve(true), Err(CredentialError::GateUnavailable));
        store.delete().unwrap();
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::default();
        assert_eq!(store.retrieve(false), Err(CredentialError::NotFound));
        store.store("tok").unwrap();
        assert_eq!(store.retrieve(false).unwrap(), "tok");
        store.delete().unwrap();
        assert!(!store.exists());
    }
}
