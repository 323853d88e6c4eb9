//! Harness configuration: where things live and how runs behave.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CacheLocator;
use crate::catalog::Catalog;
use crate::exec::{ExecContext, Executor};
use crate::fetch::{CleanupPolicy, Fetcher};
use crate::setup::SetupStage;
use crate::telemetry::LogSettings;
use crate::vars::{Vars, SABATH_CACHE, SABATH_DIR};

/// Default cache directory name under the install root.
pub const DEFAULT_CACHE_DIR: &str = ".sabath";

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Install root; holds `db/` and is exposed as `$[SABATH_DIR]`.
    pub root: PathBuf,
    /// Cache root for fetched models and datasets.
    pub cache: PathBuf,
    #[serde(default)]
    pub cleanup: CleanupPolicy,
    #[serde(default)]
    pub log: LogSettings,
}

impl HarnessConfig {
    /// Configuration rooted at `root` with the default cache location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let cache = root.join(DEFAULT_CACHE_DIR);
        Self {
            root,
            cache,
            cleanup: CleanupPolicy::default(),
            log: LogSettings::default(),
        }
    }

    /// Build from optional overrides (flag or environment), defaulting the
    /// root to the current directory and the cache to `<root>/.sabath`.
    pub fn resolve(root: Option<PathBuf>, cache: Option<PathBuf>) -> std::io::Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let mut config = Self::new(root);
        if let Some(cache) = cache {
            config = config.with_cache(cache);
        }
        Ok(config)
    }

    pub fn with_cache(mut self, cache: impl AsRef<Path>) -> Self {
        let cache = cache.as_ref();
        self.cache = std::path::absolute(cache).unwrap_or_else(|_| cache.to_path_buf());
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_log(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }

    /// Process-wide substitution table.
    pub fn base_vars(&self) -> Vars {
        Vars::new()
            .with(SABATH_DIR, self.root.to_string_lossy())
            .with(SABATH_CACHE, self.cache.to_string_lossy())
    }

    /// Execution context without output capture.
    pub fn exec_context(&self) -> ExecContext {
        ExecContext::new(self.base_vars())
            .with_env(SABATH_DIR, self.root.to_string_lossy())
            .with_env(SABATH_CACHE, self.cache.to_string_lossy())
    }

    pub fn cache_locator(&self) -> CacheLocator {
        CacheLocator::new(&self.cache)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(&self.root)
    }

    /// Fetcher using `executor` and this configuration's cleanup policy.
    pub fn fetcher(&self, executor: Executor) -> Fetcher {
        Fetcher::new(self.cache_locator(), executor).with_cleanup(self.cleanup)
    }

    /// Setup stage outside of any report; child output goes to the terminal.
    pub fn setup_stage(&self) -> SetupStage {
        SetupStage::new(self.fetcher(Executor::new(self.exec_context())))
    }
}
