//! Pipeline matrix execution engine

pub mod events;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use events::{EventHandler, EventSink, RunnerEvent};
pub use executor::{StepExecutor, StepOutcome};
pub use runner::{MatrixRunner, RunnerConfig};
pub use scheduler::SchedulingStrategy;
