//! The running company: organization plus pipeline manager.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::board::BoardVoter;
use crate::config::Settings;
use crate::events::EventSink;
use crate::llm::Completion;
use crate::memory::Store;
use crate::org::Organization;
use crate::pipeline::PipelineManager;
use crate::seed::CompanySeed;

pub struct Company {
    pub org: Arc<Organization>,
    pub pipelines: Arc<PipelineManager>,
}

impl Company {
    /// Build the organization, restore any persisted seed, bootstrap the
    /// default structure and, if seeded, start producing pipelines.
    pub async fn start(
        settings: Settings,
        completion: Arc<dyn Completion>,
        board: Arc<dyn BoardVoter>,
        events: Arc<dyn EventSink>,
        store: Option<Arc<dyn Store>>,
    ) -> Result<Self> {
        let (org, completions) =
            Organization::new(settings, completion, events, store).context("invalid settings")?;
        let seeded = org.load_seed().await.is_some();
        org.initialize_structure()
            .context("failed to build the organization structure")?;
        let pipelines = PipelineManager::new(Arc::clone(&org), board, completions);
        if seeded {
            pipelines.start_continuous();
        }
        tracing::info!(seeded, "Company started");
        Ok(Self { org, pipelines })
    }

    /// Activate `seed` and make sure pipelines are being produced.
    pub async fn set_seed(&self, seed: CompanySeed) -> CompanySeed {
        let seed = self.org.set_seed(seed).await;
        self.pipelines.start_continuous();
        seed
    }

    pub async fn shutdown(&self) {
        self.pipelines.stop_continuous();
        self.org.stop().await;
        tracing::info!("Company shut down");
    }
}
