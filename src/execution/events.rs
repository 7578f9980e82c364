//! Events emitted while a matrix runs

use crate::core::Verdict;
use std::sync::Arc;
use std::time::Duration;

/// Events that can occur during a matrix run
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    PipelineStarted {
        pipeline: String,
    },
    EnvironmentAcquired {
        pipeline: String,
        step: usize,
        image: String,
        environment_id: String,
    },
    CommandStarted {
        pipeline: String,
        step: usize,
        command: String,
    },
    CommandFinished {
        pipeline: String,
        step: usize,
        command: String,
        exit_code: i32,
        timed_out: bool,
        duration: Duration,
    },
    PipelineFinished {
        pipeline: String,
        verdict: Verdict,
        duration: Duration,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunnerEvent) + Send + Sync>;

/// Fan-out of events to the handlers registered before the run started
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventSink {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    pub fn emit(&self, event: RunnerEvent) {
        for handler in self.handlers.iter() {
            handler(event.clone());
        }
    }
}
