use crate::types::{Workflow, WorkflowStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use strata_core::{StrataError, StrataResult};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Result of an atomic status compare-and-set.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The status matched and was replaced; carries the updated record.
    Applied(Workflow),
    /// The record exists but was in a different status.
    Rejected(WorkflowStatus),
    /// No record with that id.
    Missing,
}

/// Durable storage for workflow records.
///
/// Every read returns a whole-record snapshot and every write replaces a
/// whole record, so readers never observe a workflow mid-mutation.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert(&self, workflow: &Workflow) -> StrataResult<()>;
    async fn get(&self, id: Uuid) -> StrataResult<Option<Workflow>>;
    async fn update(&self, workflow: &Workflow) -> StrataResult<()>;
    async fn list(&self) -> StrataResult<Vec<Workflow>>;

    /// Atomically move `id` from `expected` to `next`, stamping timestamps
    /// through [`Workflow::transition_to`].
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> StrataResult<Transition>;
}

/// Process-local store. Good for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, workflow: &Workflow) -> StrataResult<()> {
        let mut workflows = self.workflows.write().await;
        if workflows.contains_key(&workflow.id) {
            return Err(StrataError::Store(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StrataResult<Option<Workflow>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn update(&self, workflow: &Workflow) -> StrataResult<()> {
        let mut workflows = self.workflows.write().await;
        match workflows.get_mut(&workflow.id) {
            Some(existing) => {
                *existing = workflow.clone();
                Ok(())
            }
            None => Err(StrataError::NotFound(format!("workflow {}", workflow.id))),
        }
    }

    async fn list(&self) -> StrataResult<Vec<Workflow>> {
        Ok(self.workflows.read().await.values().cloned().collect())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> StrataResult<Transition> {
        let mut workflows = self.workflows.write().await;
        let Some(workflow) = workflows.get_mut(&id) else {
            return Ok(Transition::Missing);
        };
        if workflow.status != expected {
            return Ok(Transition::Rejected(workflow.status));
        }
        workflow.transition_to(next);
        Ok(Transition::Applied(workflow.clone()))
    }
}

/// JSON-file store: one `<id>.json` per workflow.
///
/// Writes go to a temporary file that is renamed into place, and all
/// read-modify-write sequences hold a single lock.
pub struct FileWorkflowStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileWorkflowStore {
    pub async fn new(dir: PathBuf) -> StrataResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn workflow_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> StrataResult<Option<Workflow>> {
        let path = self.workflow_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let workflow: Workflow = serde_json::from_str(&data)
            .map_err(|e| StrataError::Store(format!("Failed to parse workflow {id}: {e}")))?;
        Ok(Some(workflow))
    }

    async fn write(&self, workflow: &Workflow) -> StrataResult<()> {
        let path = self.workflow_path(workflow.id);
        let tmp = self.dir.join(format!("{}.json.tmp", workflow.id));
        let json = serde_json::to_string_pretty(workflow)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn insert(&self, workflow: &Workflow) -> StrataResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.read(workflow.id).await?.is_some() {
            return Err(StrataError::Store(format!(
                "workflow {} already exists",
                workflow.id
            )));
        }
        self.write(workflow).await
    }

    async fn get(&self, id: Uuid) -> StrataResult<Option<Workflow>> {
        self.read(id).await
    }

    async fn update(&self, workflow: &Workflow) -> StrataResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.read(workflow.id).await?.is_none() {
            return Err(StrataError::NotFound(format!("workflow {}", workflow.id)));
        }
        self.write(workflow).await
    }

    async fn list(&self) -> StrataResult<Vec<Workflow>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut workflows = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Ok(id) = Uuid::parse_str(stem) {
                if let Some(workflow) = self.read(id).await? {
                    workflows.push(workflow);
                }
            }
        }
        Ok(workflows)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> StrataResult<Transition> {
        let _guard = self.write_lock.lock().await;
        let Some(mut workflow) = self.read(id).await? else {
            return Ok(Transition::Missing);
        };
        if workflow.status != expected {
            return Ok(Transition::Rejected(workflow.status));
        }
        workflow.transition_to(next);
        self.write(&workflow).await?;
        Ok(Transition::Applied(workflow))
    }
}
