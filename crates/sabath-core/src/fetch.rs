//! Acquisition of models and datasets into the cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheLocator;
use crate::descriptor::{Acquisition, Entity};
use crate::error::{Result, SabathError};
use crate::exec::Executor;
use crate::vars::Vars;

/// What to remove when an acquisition fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Remove the target directory only if it is empty; a partially populated
    /// directory stays behind and will be treated as fetched next time.
    #[default]
    EmptyOnly,
    /// Remove the target directory and everything in it.
    Recursive,
}

impl CleanupPolicy {
    /// Best-effort removal. Failures are logged and swallowed.
    pub fn clean(&self, dir: &Path) {
        let res = match self {
            CleanupPolicy::EmptyOnly => std::fs::remove_dir(dir),
            CleanupPolicy::Recursive => std::fs::remove_dir_all(dir),
        };
        match res {
            Ok(()) => debug!(dir = %dir.display(), "removed failed fetch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove failed fetch directory"),
        }
    }
}

/// Places entities into their cache directories. Idempotent per id.
#[derive(Debug, Clone)]
pub struct Fetcher {
    cache: CacheLocator,
    executor: Executor,
    cleanup: CleanupPolicy,
}

impl Fetcher {
    pub fn new(cache: CacheLocator, executor: Executor) -> Self {
        Self {
            cache,
            executor,
            cleanup: CleanupPolicy::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn cache(&self) -> &CacheLocator {
        &self.cache
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Return the entity's cache directory, acquiring it first if absent.
    ///
    /// An existing directory is trusted as-is. On failure the target directory
    /// is cleaned up according to the [`CleanupPolicy`] and the original error
    /// is returned unchanged.
    pub fn fetch<E: Entity + ?Sized>(&self, entity: &E) -> Result<PathBuf> {
        let dir = self.cache.locate(entity.id());
        if dir.exists() {
            debug!(id = %entity.id(), dir = %dir.display(), "already fetched");
            return Ok(dir);
        }

        let acquisition = entity
            .source()
            .and_then(|s| s.acquisition())
            .ok_or_else(|| SabathError::UnknownAcquisition {
                id: entity.id().to_string(),
            })?;

        info!("{} {} ...", entity.fetch_label(), entity.id());

        if let Err(e) = self.acquire(acquisition, &dir) {
            self.cleanup.clean(&dir);
            return Err(e);
        }
        Ok(dir)
    }

    fn acquire(&self, acquisition: Acquisition<'_>, dir: &Path) -> Result<()> {
        match acquisition {
            Acquisition::Git(git) => {
                let parent = dir.parent().unwrap_or(self.cache.root());
                std::fs::create_dir_all(parent)?;
                let url = self.executor.context().vars.substitute(&git.url);
                let target = dir.to_string_lossy();
                self.executor
                    .run_program("git", &["clone", url.as_str(), target.as_ref()], parent)?;
                if let Some(steps) = &git.steps {
                    self.executor.execute(steps, dir, &Vars::new())?;
                }
            }
            Acquisition::Shell(commands) => {
                std::fs::create_dir_all(dir)?;
                self.executor.execute(commands, dir, &Vars::new())?;
            }
        }
        Ok(())
    }
}
