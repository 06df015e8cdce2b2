//! Saved user preferences
//!
//! A small JSON file holding the username, the last refresh token handed
//! out by the identity provider, and the setups directory. The password is
//! never written anywhere; a run that cannot refresh asks for it again.
//!
//! The file lives under the platform-local data directory
//! (`~/.local/share/p1doks-fetcher/preferences.json` on Linux), falling
//! back to the working directory when the platform directory cannot be
//! determined.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::files;
use crate::errors::PreferencesError;

/// Persisted state between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    /// P1Doks account username
    pub username: String,
    /// Refresh token from the last successful authentication
    pub refresh_token: String,
    /// iRacing setups directory downloads are organized under
    pub setups_path: PathBuf,
}

/// Reads and writes the preference file
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl Default for PreferencesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferencesStore {
    /// Store at the platform default location
    pub fn new() -> Self {
        let dir = dirs::data_local_dir()
            .map(|d| d.join(files::APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: dir.join(files::PREFERENCES_FILE_NAME),
        }
    }

    /// Store at an explicit path (tests use a tempdir)
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved preferences
    ///
    /// A missing file is a normal first run. An unreadable or malformed
    /// file degrades to "no saved session" with a warning rather than
    /// failing the run.
    pub fn load(&self) -> Option<Preferences> {
        if !self.path.exists() {
            return None;
        }

        match self.read() {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Could not read preference file, treating as no saved session"
                );
                None
            }
        }
    }

    fn read(&self) -> Result<Preferences, PreferencesError> {
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save preferences, creating the parent directory as needed
    pub fn save(&self, prefs: &Preferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, contents)?;
        tracing::debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }

    /// Remove the preference file, used after a terminal session expiry
    pub fn clear(&self) -> Result<(), PreferencesError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
