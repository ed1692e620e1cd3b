use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{StrataError, StrataResult};
use strata_orchestrator::{
    AgentDescriptor, FileWorkflowStore, InMemoryAgentRegistry, InMemoryWorkflowStore,
    SimulatedExecutor, WorkflowEngine, WorkflowStore, DEFAULT_BOTTLENECK_LIMIT,
};
use tracing::info;

/// Contents of `strata.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Settings for the simulated executor used by `strata serve`.
#[derive(Debug, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Task ids that always fail.
    #[serde(default)]
    pub fail_tasks: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            fail_tasks: vec![],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_bottleneck_limit")]
    pub bottleneck_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bottleneck_limit: default_bottleneck_limit(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_latency_ms() -> u64 {
    50
}
fn default_bottleneck_limit() -> usize {
    DEFAULT_BOTTLENECK_LIMIT
}

impl StrataConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> StrataResult<Self> {
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path).await?;
        Self::parse(&raw)
            .map_err(|e| StrataError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Wire the configured store, executor and agents into an engine.
    pub async fn build_engine(&self) -> StrataResult<WorkflowEngine> {
        let store: Arc<dyn WorkflowStore> = match self.store.backend {
            StoreBackend::Memory => Arc::new(InMemoryWorkflowStore::new()),
            StoreBackend::File => {
                let dir = self.store.data_dir.join("workflows");
                info!(dir = %dir.display(), "Using file workflow store");
                Arc::new(FileWorkflowStore::new(dir).await?)
            }
        };

        let executor = SimulatedExecutor::new(Duration::from_millis(self.executor.latency_ms))
            .with_failing(self.executor.fail_tasks.iter().cloned());

        // A repeated id replaces the earlier entry.
        let registry = InMemoryAgentRegistry::new();
        for agent in &self.agents {
            registry
                .register(AgentDescriptor::new(agent.id.clone(), agent.capabilities.iter().cloned()))
                .await;
        }
        info!(count = registry.agent_count().await, "Agents registered");

        Ok(WorkflowEngine::new(store, Arc::new(executor))
            .with_registry(Arc::new(registry))
            .with_bottleneck_limit(self.analytics.bottleneck_limit))
    }
}
