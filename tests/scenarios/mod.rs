//! Scenario-based tests for pipeline-matrix

mod cancellation;
mod events;
mod fail_fast;
mod isolation;
