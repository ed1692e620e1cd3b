use crate::types::ExecutionMode;

/// Decides which ready tasks the scheduler launches next.
///
/// `ready` holds task indices in definition order. Implementations return a
/// subset of it; the scheduler never launches anything else.
pub trait DispatchStrategy: Send + Sync {
    fn select(&self, ready: &[usize], in_flight: usize) -> Vec<usize>;
}

/// Launches every ready task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelDispatch;

impl DispatchStrategy for ParallelDispatch {
    fn select(&self, ready: &[usize], _in_flight: usize) -> Vec<usize> {
        ready.to_vec()
    }
}

/// Launches the lowest-index ready task, and only when nothing is running.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialDispatch;

impl DispatchStrategy for SequentialDispatch {
    fn select(&self, ready: &[usize], in_flight: usize) -> Vec<usize> {
        if in_flight > 0 {
            return Vec::new();
        }
        ready.iter().min().map(|&i| vec![i]).unwrap_or_default()
    }
}

impl ExecutionMode {
    pub fn strategy(self) -> &'static dyn DispatchStrategy {
        match self {
            ExecutionMode::Parallel => &ParallelDispatch,
            ExecutionMode::Sequential => &SequentialDispatch,
        }
    }
}
