use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Upper bound for a single backoff wait, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 300_000;

/// How a workflow's ready tasks are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Every ready task is launched at once.
    #[default]
    Parallel,
    /// One task at a time, lowest definition order first.
    Sequential,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Sequential => write!(f, "sequential"),
        }
    }
}

/// Retry behaviour for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total executor invocations allowed, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: 0,
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl RetryPolicy {
    /// Clamp values that would make the retry loop meaningless.
    pub fn normalized(mut self) -> Self {
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            self.backoff_factor = default_backoff_factor();
        }
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base_delay_ms × backoff_factor^(attempt-1)`, capped at [`MAX_BACKOFF_MS`].
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);
        if !delay.is_finite() || delay >= MAX_BACKOFF_MS as f64 {
            MAX_BACKOFF_MS
        } else {
            delay.round() as u64
        }
    }
}

/// A task as submitted by a client, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub required_capability: Option<String>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depends_on: Vec::new(),
            required_capability: None,
            retry_policy: None,
            timeout_ms: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Request body for creating a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
    pub tasks: Vec<TaskSpec>,
}

impl CreateWorkflowRequest {
    pub fn new(name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.into(),
            description: None,
            mode: None,
            tasks,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A task definition as persisted, with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub depends_on: Vec<String>,
    pub required_capability: Option<String>,
    pub retry_policy: RetryPolicy,
    pub timeout_ms: Option<u64>,
}

impl From<TaskSpec> for Task {
    fn from(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            depends_on: spec.depends_on,
            required_capability: spec.required_capability,
            retry_policy: spec.retry_policy.unwrap_or_default().normalized(),
            timeout_ms: spec.timeout_ms.filter(|ms| *ms > 0),
        }
    }
}

/// Status of a single task within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Mutable execution state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Agent resolved from the task's required capability, if any.
    #[serde(default)]
    pub assigned_agent: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            assigned_agent: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Wall-clock time between start and completion, when both are known.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::pending()
    }
}

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Pending => write!(f, "pending"),
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A persisted workflow record: definition plus live execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub mode: ExecutionMode,
    pub tasks: Vec<Task>,
    pub task_states: BTreeMap<String, TaskState>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Build a pending workflow from an already validated request.
    ///
    /// One `pending` [`TaskState`] is created per task.
    pub fn from_request(request: CreateWorkflowRequest) -> Self {
        let tasks: Vec<Task> = request.tasks.into_iter().map(Task::from).collect();
        let task_states = tasks
            .iter()
            .map(|t| (t.id.clone(), TaskState::pending()))
            .collect();

        Self {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description.unwrap_or_default(),
            mode: request.mode.unwrap_or_default(),
            tasks,
            task_states,
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `status`, stamping the start or completion time as appropriate.
    pub fn transition_to(&mut self, status: WorkflowStatus) {
        let now = Utc::now();
        match status {
            WorkflowStatus::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        self.status = status;
    }

    pub fn task_state(&self, task_id: &str) -> Option<&TaskState> {
        self.task_states.get(task_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
