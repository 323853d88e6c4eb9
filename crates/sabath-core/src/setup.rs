//! One-time model setup, gated by the marker file.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cache::SETUP_MARKER;
use crate::descriptor::{Entity, ModelDescriptor};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::vars::Vars;

/// Fetches a model and runs its `setup` commands exactly once.
#[derive(Debug, Clone)]
pub struct SetupStage {
    fetcher: Fetcher,
}

impl SetupStage {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Ensure the model is fetched and set up; returns its cache directory.
    ///
    /// The marker is written only after every setup command succeeded. A
    /// failed setup leaves the fetched directory in place so the next attempt
    /// skips the fetch and retries setup.
    pub fn ensure_setup(&self, model: &ModelDescriptor) -> Result<PathBuf> {
        let dir = self.fetcher.fetch(model)?;

        let marker = dir.join(SETUP_MARKER);
        if marker.exists() {
            debug!(id = %model.id(), "setup already complete");
            return Ok(dir);
        }

        info!("SETUP {} ...", model.id());
        self.fetcher
            .executor()
            .execute(&model.setup, &dir, &Vars::new())?;
        std::fs::File::create(&marker)?;

        Ok(dir)
    }
}
