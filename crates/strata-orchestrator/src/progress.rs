use crate::types::{TaskState, TaskStatus, Workflow, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Task counters for one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// `round(100 * completed / total)`.
    pub percent_complete: u32,
}

/// Body of `GET /orchestration/workflows/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatusReport {
    pub status: WorkflowStatus,
    pub progress: Progress,
    pub task_states: BTreeMap<String, TaskState>,
}

/// Derives progress reports from workflow snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressTracker;

impl ProgressTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn progress(&self, workflow: &Workflow) -> Progress {
        let mut progress = Progress {
            total: workflow.task_count(),
            ..Progress::default()
        };
        for task in &workflow.tasks {
            let status = workflow
                .task_state(&task.id)
                .map_or(TaskStatus::Pending, |s| s.status);
            match status {
                TaskStatus::Pending => progress.pending += 1,
                TaskStatus::Running => progress.running += 1,
                TaskStatus::Completed => progress.completed += 1,
                TaskStatus::Failed => progress.failed += 1,
            }
        }
        progress.percent_complete = percent(progress.completed, progress.total);
        progress
    }

    pub fn status(&self, workflow: &Workflow) -> WorkflowStatusReport {
        WorkflowStatusReport {
            status: workflow.status,
            progress: self.progress(workflow),
            task_states: workflow.task_states.clone(),
        }
    }
}

fn percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 * 100.0) / total as f64).round() as u32
}
