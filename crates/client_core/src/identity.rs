//! The one piece of state that survives a restart: who was signed in.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::domain::Username;

pub const IDENTITY_FILE: &str = "identity.json";

pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<Username>>;
    /// `None` forgets the identity (logout).
    fn save(&self, user: Option<&Username>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIdentity {
    current_user: Option<Username>,
}

#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(IDENTITY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<Username>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read identity file '{}'", self.path.display())
                })
            }
        };
        let persisted: PersistedIdentity = serde_json::from_str(&raw).with_context(|| {
            format!("malformed identity file '{}'", self.path.display())
        })?;
        // A blank name on disk is the same as no name.
        Ok(persisted
            .current_user
            .and_then(|user| Username::parse(user.as_str()).ok()))
    }

    fn save(&self, user: Option<&Username>) -> Result<()> {
        let Some(user) = user else {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err).with_context(|| {
                    format!("failed to remove identity file '{}'", self.path.display())
                }),
            };
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create data directory '{}'", parent.display())
            })?;
        }
        let body = serde_json::to_string_pretty(&PersistedIdentity {
            current_user: Some(user.clone()),
        })?;
        fs::write(&self.path, body).with_context(|| {
            format!("failed to write identity file '{}'", self.path.display())
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    user: Mutex<Option<Username>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: impl Into<Username>) -> Self {
        Self {
            user: Mutex::new(Some(user.into())),
        }
    }

    pub fn current(&self) -> Option<Username> {
        self.user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<Username>> {
        Ok(self.current())
    }

    fn save(&self, user: Option<&Username>) -> Result<()> {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = user.cloned();
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
