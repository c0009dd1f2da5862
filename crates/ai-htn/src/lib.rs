//! Hierarchical task network planning and execution.
//!
//! Task networks are registered in a [`TaskRegistry`]. [`HtnPlanJob`] decomposes a root task into
//! a linear [`Plan`] with depth-first backtracking, a few task evaluations per time slice, and
//! [`HtnSystem`] runs one search and one plan per agent on top of an `ai-core` job queue.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod builtin;
pub mod config;
pub mod debug;
mod exec;
#[cfg(feature = "yaml")]
#[cfg_attr(docsrs, doc(cfg(feature = "yaml")))]
pub mod loader;
pub mod operator;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod system;
pub mod task;

pub use builtin::{KeyEquals, KeyExists, KeyMissing, Literal, Not, SetOperator, WaitOperator};
pub use config::{AgentConfig, HtnConfig};
pub use debug::{describe_domain, describe_plan};
#[cfg(feature = "yaml")]
pub use loader::{DomainDoc, DomainLoader, LoadError};
pub use operator::{Operator, OperatorPlan, OperatorStatus, Precondition, Service, ShutdownCondition};
pub use plan::{is_better_traversal, Plan, PlanStep};
pub use planner::{HtnPlanJob, HtnPlanner, HtnPlannerConfig, PlanError};
pub use registry::{RegistryError, TaskRegistry};
pub use system::{AgentState, DebugMessage, HtnAgent, HtnSystem, UpdateReport};
pub use task::{
    Branch, CompoundTask, ParallelTask, PrimitiveTask, RepeatingTask, ServiceBinding, Task, TaskId,
    TaskKind,
};
