use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::RwLock;

/// An agent and the capability tags it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl AgentDescriptor {
    pub fn new<I, S>(id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Resolves a task's required capability to an executing agent.
///
/// Resolution is advisory: a miss never blocks a task from running.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    async fn resolve(&self, capability: &str) -> Option<String>;
}

/// Registry backed by an in-process list. First registered match wins.
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<Vec<AgentDescriptor>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, replacing any earlier entry with the same id.
    pub async fn register(&self, agent: AgentDescriptor) {
        let mut agents = self.agents.write().await;
        if let Some(existing) = agents.iter_mut().find(|a| a.id == agent.id) {
            *existing = agent;
        } else {
            agents.push(agent);
        }
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn resolve(&self, capability: &str) -> Option<String> {
        let agents = self.agents.read().await;
        agents.iter().find(|a| a.has(capability)).map(|a| a.id.clone())
    }
}
