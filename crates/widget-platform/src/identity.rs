//! Persisted per-device client identity.
//!
//! The identity token rides every analysis API call so the service can rate
//! limit per device; the retry policy depends on that, so the token must be
//! stable across sessions.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityStoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
    #[error("identity store backend failure: {0}")]
    Backend(String),
}

/// Storage for the stable per-device identity token.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, IdentityStoreError>;

    fn store(&self, token: &str) -> Result<(), IdentityStoreError>;
}

/// Return the persisted token, generating and persisting one on first use.
pub fn load_or_create_identity(store: &dyn IdentityStore) -> Result<String, IdentityStoreError> {
    if let Some(existing) = store.load()? {
        return Ok(existing);
    }

    let token = Uuid::new_v4().to_string();
    store.store(&token)?;
    Ok(token)
}

#[derive(Clone, Default)]
pub struct InMemoryIdentityStore {
    token: Arc<RwLock<Option<String>>>,
}

impl IdentityStore for InMemoryIdentityStore {
    fn load(&self) -> Result<Option<String>, IdentityStoreError> {
        let token = self
            .token
            .read()
            .map_err(|_| IdentityStoreError::Backend("poisoned lock".to_owned()))?;
        Ok(token.clone())
    }

    fn store(&self, token: &str) -> Result<(), IdentityStoreError> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| IdentityStoreError::Backend("poisoned lock".to_owned()))?;
        *slot = Some(token.to_owned());
        Ok(())
    }
}

/// On-disk identity file payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct IdentityFile {
    client_id: String,
}

/// JSON-file backed store; writes go through a temp file and rename so a
/// crash never leaves a truncated identity behind.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<String>, IdentityStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(IdentityStoreError::Unavailable(format!(
                    "failed reading identity file {}: {err}",
                    self.path.display()
                )));
            }
        };

        let file = serde_json::from_str::<IdentityFile>(&raw).map_err(|err| {
            IdentityStoreError::Backend(format!(
                "failed parsing identity file {}: {err}",
                self.path.display()
            ))
        })?;
        Ok(Some(file.client_id))
    }

    fn store(&self, token: &str) -> Result<(), IdentityStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                IdentityStoreError::Backend(format!(
                    "failed creating identity directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let encoded = serde_json::to_vec(&IdentityFile {
            client_id: token.to_owned(),
        })
        .map_err(|err| IdentityStoreError::Backend(err.to_string()))?;

        let temp_path = identity_temp_path(&self.path);
        fs::write(&temp_path, encoded).map_err(|err| {
            IdentityStoreError::Backend(format!(
                "failed writing temp identity file {}: {err}",
                temp_path.display()
            ))
        })?;

        fs::rename(&temp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            IdentityStoreError::Backend(format!(
                "failed replacing identity file {}: {err}",
                self.path.display()
            ))
        })
    }
}

fn identity_temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("client-identity.json");
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    parent.join(format!(".{file_name}.{now_nanos}.tmp"))
}
