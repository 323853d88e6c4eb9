//! Cache directory layout.
//!
//! Layout: `<cache-root>/<id>` per entity, plus `<cache-root>/<id>/.setup.slip`
//! once a model's setup has completed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker file recording that a model's setup completed.
pub const SETUP_MARKER: &str = ".setup.slip";

/// Lifecycle of a single cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheState {
    /// No directory.
    Absent,
    /// Directory exists, setup not done.
    Fetched,
    /// Directory and marker file both exist.
    SetupComplete,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheState::Absent => write!(f, "absent"),
            CacheState::Fetched => write!(f, "fetched"),
            CacheState::SetupComplete => write!(f, "setup-complete"),
        }
    }
}

/// Maps entity ids to cache directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocator {
    root: PathBuf,
}

impl CacheLocator {
    /// Create a locator rooted at `root`. Relative roots are resolved against
    /// the current directory once, here.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory for `id`. Pure path arithmetic.
    pub fn locate(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Setup marker path for `id`.
    pub fn marker(&self, id: &str) -> PathBuf {
        self.locate(id).join(SETUP_MARKER)
    }

    /// Inspect the on-disk lifecycle state for `id`.
    pub fn state(&self, id: &str) -> CacheState {
        if self.marker(id).exists() {
            CacheState::SetupComplete
        } else if self.locate(id).exists() {
            CacheState::Fetched
        } else {
            CacheState::Absent
        }
    }
}
