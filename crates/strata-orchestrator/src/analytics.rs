use crate::types::{TaskStatus, Workflow, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Default number of bottleneck entries reported.
pub const DEFAULT_BOTTLENECK_LIMIT: usize = 5;

/// A task id ranked by how often it slows down or breaks workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub task_id: String,
    /// Appearances across workflows that were started.
    pub occurrences: usize,
    /// Mean `startedAt → completedAt` over finished occurrences; 0 if none.
    pub average_duration_ms: f64,
    pub failures: usize,
    /// Extra executor invocations beyond the first.
    pub retries: u64,
    /// `failures + retries`.
    pub score: u64,
}

/// Body of `GET /orchestration/analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAnalytics {
    pub total_workflows: usize,
    pub completed_workflows: usize,
    pub success_rate: f64,
    pub bottlenecks: Vec<Bottleneck>,
    /// Per task id: completed occurrences over occurrences in started
    /// workflows. Workflows that never left `pending` (including those
    /// cancelled before starting) count toward `total_workflows` only.
    pub task_success_rates: BTreeMap<String, f64>,
}

#[derive(Default)]
struct TaskTally {
    occurrences: usize,
    completed: usize,
    failures: usize,
    retries: u64,
    duration_total_ms: u64,
    timed: usize,
}

/// Folds workflow snapshots into cross-workflow statistics.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsAggregator {
    bottleneck_limit: usize,
}

impl Default for AnalyticsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BOTTLENECK_LIMIT)
    }
}

impl AnalyticsAggregator {
    pub fn new(bottleneck_limit: usize) -> Self {
        Self { bottleneck_limit }
    }

    pub fn bottleneck_limit(&self) -> usize {
        self.bottleneck_limit
    }

    pub fn aggregate(&self, workflows: &[Workflow]) -> WorkflowAnalytics {
        let total_workflows = workflows.len();
        let completed_workflows = workflows
            .iter()
            .filter(|w| w.status == WorkflowStatus::Completed)
            .count();
        let success_rate = if total_workflows == 0 {
            0.0
        } else {
            completed_workflows as f64 / total_workflows as f64
        };

        let mut tallies: BTreeMap<String, TaskTally> = BTreeMap::new();
        for workflow in workflows.iter().filter(|w| w.started_at.is_some()) {
            for task in &workflow.tasks {
                let tally = tallies.entry(task.id.clone()).or_default();
                tally.occurrences += 1;
                let Some(state) = workflow.task_state(&task.id) else {
                    continue;
                };
                match state.status {
                    TaskStatus::Completed => tally.completed += 1,
                    TaskStatus::Failed => tally.failures += 1,
                    TaskStatus::Pending | TaskStatus::Running => {}
                }
                tally.retries += u64::from(state.attempts.saturating_sub(1));
                if let Some(ms) = state.duration_ms() {
                    tally.duration_total_ms += ms;
                    tally.timed += 1;
                }
            }
        }

        let task_success_rates = tallies
            .iter()
            .map(|(id, t)| (id.clone(), t.completed as f64 / t.occurrences as f64))
            .collect();

        let mut bottlenecks: Vec<Bottleneck> = tallies
            .into_iter()
            .map(|(task_id, t)| Bottleneck {
                task_id,
                occurrences: t.occurrences,
                average_duration_ms: if t.timed == 0 {
                    0.0
                } else {
                    t.duration_total_ms as f64 / t.timed as f64
                },
                failures: t.failures,
                retries: t.retries,
                score: t.failures as u64 + t.retries,
            })
            .collect();
        bottlenecks.sort_by(rank);
        bottlenecks.truncate(self.bottleneck_limit);

        WorkflowAnalytics {
            total_workflows,
            completed_workflows,
            success_rate,
            bottlenecks,
            task_success_rates,
        }
    }
}

fn rank(a: &Bottleneck, b: &Bottleneck) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.average_duration_ms.total_cmp(&a.average_duration_ms))
        .then_with(|| a.task_id.cmp(&b.task_id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{CreateWorkflowRequest, TaskSpec};
    use chrono::{Duration, Utc};

    fn finished(status: WorkflowStatus, runs: &[(&str, TaskStatus, u32, i64)]) -> Workflow {
        let specs = runs.iter().map(|(id, ..)| TaskSpec::new(*id, *id)).collect();
        let mut wf = Workflow::from_request(CreateWorkflowRequest::new("wf", specs));
        let start = Utc::now();
        for (id, task_status, attempts, ms) in runs {
            let state = wf.task_states.get_mut(*id).unwrap();
            state.status = *task_status;
            state.attempts = *attempts;
            if *attempts > 0 {
                state.started_at = Some(start);
                state.completed_at = Some(start + Duration::milliseconds(*ms));
            }
        }
        wf.transition_to(WorkflowStatus::Running);
        wf.transition_to(status);
        wf
    }

    #[test]
    fn test_empty_history() {
        let a = AnalyticsAggregator::default().aggregate(&[]);
        assert_eq!(a.total_workflows, 0);
        assert_eq!(a.success_rate, 0.0);
        assert!(a.bottlenecks.is_empty());
        assert!(a.task_success_rates.is_empty());
    }

    #[test]
    fn test_success_rates() {
        let workflows = vec![
            finished(
                WorkflowStatus::Completed,
                &[("fetch", TaskStatus::Completed, 1, 10), ("price", TaskStatus::Completed, 1, 10)],
            ),
            finished(
                WorkflowStatus::Failed,
                &[("fetch", TaskStatus::Completed, 1, 10), ("price", TaskStatus::Failed, 3, 10)],
            ),
            Workflow::from_request(CreateWorkflowRequest::new(
                "idle",
                vec![TaskSpec::new("fetch", "fetch")],
            )),
        ];
        let a = AnalyticsAggregator::default().aggregate(&workflows);

        assert_eq!(a.total_workflows, 3);
        assert_eq!(a.completed_workflows, 1);
        assert!((a.success_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((a.task_success_rates["fetch"] - 1.0).abs() < 1e-9);
        assert!((a.task_success_rates["price"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_never_started_workflows_skip_task_tallies() {
        let mut withdrawn = Workflow::from_request(CreateWorkflowRequest::new(
            "withdrawn",
            vec![TaskSpec::new("settle", "settle"), TaskSpec::new("audit", "audit")],
        ));
        withdrawn.transition_to(WorkflowStatus::Cancelled);
        let workflows = vec![
            finished(WorkflowStatus::Completed, &[("settle", TaskStatus::Completed, 1, 5)]),
            withdrawn,
        ];
        let a = AnalyticsAggregator::default().aggregate(&workflows);

        assert_eq!(a.total_workflows, 2);
        assert_eq!(a.task_success_rates.len(), 1);
        assert!((a.task_success_rates["settle"] - 1.0).abs() < 1e-9);
        assert_eq!(a.bottlenecks.len(), 1);
        assert_eq!(a.bottlenecks[0].occurrences, 1);
    }

    #[test]
    fn test_bottleneck_ranking() {
        let workflows = vec![
            finished(
                WorkflowStatus::Failed,
                &[
                    ("slow", TaskStatus::Completed, 1, 900),
                    ("flaky", TaskStatus::Completed, 3, 20),
                    ("broken", TaskStatus::Failed, 1, 5),
                    ("quick", TaskStatus::Completed, 1, 1),
                ],
            ),
            finished(
                WorkflowStatus::Completed,
                &[("slow", TaskStatus::Completed, 1, 1100), ("quick", TaskStatus::Completed, 1, 3)],
            ),
        ];
        let a = AnalyticsAggregator::default().aggregate(&workflows);
        let order: Vec<&str> = a.bottlenecks.iter().map(|b| b.task_id.as_str()).collect();
        assert_eq!(order, vec!["flaky", "broken", "slow", "quick"]);

        let slow = a.bottlenecks.iter().find(|b| b.task_id == "slow").unwrap();
        assert_eq!(slow.occurrences, 2);
        assert!((slow.average_duration_ms - 1000.0).abs() < 1e-9);
        assert_eq!(a.bottlenecks[0].retries, 2);
        assert_eq!(a.bottlenecks[0].score, 2);
        assert_eq!(a.bottlenecks[1].failures, 1);
    }

    #[test]
    fn test_bottleneck_limit() {
        let runs: Vec<(String, TaskStatus, u32, i64)> = (0..8)
            .map(|i| (format!("t{i}"), TaskStatus::Completed, 1, i))
            .collect();
        let borrowed: Vec<(&str, TaskStatus, u32, i64)> = runs
            .iter()
            .map(|(id, s, a, ms)| (id.as_str(), *s, *a, *ms))
            .collect();
        let wf = finished(WorkflowStatus::Completed, &borrowed);

        let a = AnalyticsAggregator::new(3).aggregate(std::slice::from_ref(&wf));
        assert_eq!(a.bottlenecks.len(), 3);
        assert_eq!(a.bottlenecks[0].task_id, "t7");
        assert_eq!(AnalyticsAggregator::default().aggregate(&[wf]).bottlenecks.len(), 5);
    }

    #[test]
    fn test_serializes_camel_case() {
        let a = AnalyticsAggregator::default().aggregate(&[]);
        let json = serde_json::to_value(&a).unwrap();
        for key in [
            "totalWorkflows",
            "completedWorkflows",
            "successRate",
            "bottlenecks",
            "taskSuccessRates",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
