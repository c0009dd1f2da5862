//! Deterministic, engine-agnostic AI kernel primitives.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod blackboard;
pub mod job;
pub mod rng;
pub mod tick;

pub use agent::{AgentId, RoundRobin};
pub use blackboard::{BbKey, BbValue, Blackboard, BlackboardError, Effects};
pub use job::{run_to_completion, Job, JobId, JobPoll, JobQueue, JobStatus, Slice, TimeBudget};
pub use rng::AgentRng;
pub use tick::TickContext;
