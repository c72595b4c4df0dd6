pub mod guard;
pub mod orchestrator;
pub mod sampler;

#[cfg(test)]
pub mod fake;

pub use orchestrator::{Backfill, BackfillOptions, BackfillOutcome};
