#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Question pipeline: intent gate, retrieval, ranking and feedback bookkeeping.

pub mod intent;
pub mod orchestrator;

pub use intent::{normalize, Explanation, IntentDecision, IntentGate, GENERAL};
pub use orchestrator::{Answer, Bootstrap, Orchestrator, PipelineStatus};
