//! Scheduling strategy - how many pipelines may hold environments at once

/// Strategy for scheduling pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One pipeline at a time, in matrix order
    Sequential,

    /// Every pipeline at once
    Parallel,

    /// Limited parallelism (max N concurrent pipelines)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::LimitedParallel(4)
    }
}

impl SchedulingStrategy {
    /// Strategy for a `--concurrency` value: 0 is unbounded, 1 is sequential
    pub fn from_limit(limit: usize) -> Self {
        match limit {
            0 => SchedulingStrategy::Parallel,
            1 => SchedulingStrategy::Sequential,
            n => SchedulingStrategy::LimitedParallel(n),
        }
    }

    /// Semaphore permits needed to run `pipelines` pipelines under this strategy
    pub fn permits(&self, pipelines: usize) -> usize {
        let permits = match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => pipelines,
            SchedulingStrategy::LimitedParallel(max) => (*max).min(pipelines),
        };
        permits.max(1)
    }
}
