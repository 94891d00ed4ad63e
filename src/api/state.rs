use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<Relay>,
    pub artifacts: ArtifactStore,
}

impl AppState {
    pub fn new(config: Config, relay: Arc<Relay>, artifacts: ArtifactStore) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            artifacts,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.relay.registry()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.relay.metrics()
    }
}
