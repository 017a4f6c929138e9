//! In-memory build store.

use async_trait::async_trait;
use kiln_core::Result;
use kiln_core::build::Build;
use kiln_core::ids::BuildId;
use kiln_core::ports::BuildStore;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Transient build store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryBuildStore {
    builds: RwLock<HashMap<BuildId, Build>>,
}

impl MemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.builds.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.builds.read().await.is_empty()
    }
}

#[async_trait]
impl BuildStore for MemoryBuildStore {
    async fn create(&self, build: &Build) -> Result<Build> {
        self.builds.write().await.insert(build.id, build.clone());
        Ok(build.clone())
    }

    async fn save(&self, build: &Build) -> Result<()> {
        self.builds.write().await.insert(build.id, build.clone());
        Ok(())
    }

    async fn get(&self, id: BuildId) -> Result<Option<Build>> {
        Ok(self.builds.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: u32) -> Result<Vec<Build>> {
        let builds = self.builds.read().await;
        let mut all: Vec<Build> = builds.values().cloned().collect();
        all.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        all.truncate(limit as usize);
        Ok(all)
    }
}
