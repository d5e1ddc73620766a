//! Plan persistence sinks

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{PlanSink, ProviderError};
use crate::state::PlanState;

/// Writes each finalized plan as `<plan_id>.json` under a directory
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(?dir, "JsonFileSink::new: called");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, plan_id: &str) -> PathBuf {
        let file_stem = if plan_id.trim().is_empty() { "plan" } else { plan_id };
        self.dir.join(format!("{}.json", file_stem))
    }
}

#[async_trait]
impl PlanSink for JsonFileSink {
    async fn persist(&self, state: &PlanState) -> Result<(), ProviderError> {
        debug!(plan_id = %state.plan_id, "JsonFileSink::persist: called");
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&state.plan_id);
        let json = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&path, json).await?;
        info!("Saved plan {} to {}", state.plan_id, path.display());
        Ok(())
    }
}

/// Keeps persisted plans in memory
#[derive(Default)]
pub struct MemorySink {
    plans: Mutex<Vec<PlanState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans persisted so far
    pub fn plans(&self) -> Vec<PlanState> {
        self.plans.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PlanSink for MemorySink {
    async fn persist(&self, state: &PlanState) -> Result<(), ProviderError> {
        debug!(plan_id = %state.plan_id, "MemorySink::persist: called");
        self.plans
            .lock()
            .map_err(|e| ProviderError::Failed(e.to_string()))?
            .push(state.clone());
        Ok(())
    }
}
