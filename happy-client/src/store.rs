use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::types::UserProfile;

/// What the UI knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Auth state persisted as a JSON file so sessions survive restarts.
#[derive(Debug)]
pub struct AuthStore {
    path: PathBuf,
    state: AuthState,
}

impl AuthStore {
    /// Opens the store at `path`. A missing file yields a signed-out state.
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            AuthState::default()
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.state.user.as_ref()
    }

    pub fn set_session(&mut self, token: String, user: UserProfile) -> ClientResult<()> {
        self.state = AuthState {
            token: Some(token),
            user: Some(user),
        };
        self.save()
    }

    /// Replaces the cached user, keeping the token.
    pub fn set_user(&mut self, user: UserProfile) -> ClientResult<()> {
        self.state.user = Some(user);
        self.save()
    }

    pub fn clear(&mut self) -> ClientResult<()> {
        self.state = AuthState::default();
        self.save()
    }

    fn save(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), "auth state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_signed_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = AuthStore::open(dir.path().join("auth.json")).unwrap();
        assert!(!store.state().is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn clear_writes_signed_out_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("auth.json");
        let mut store = AuthStore::open(&path).unwrap();
        store.clear().unwrap();

        let reopened = AuthStore::open(&path).unwrap();
        assert_eq!(reopened.state(), &AuthState::default());
    }
}
