//! Orchestrator configuration.

use ai_core::TimeBudget;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// System-wide settings, loadable from YAML with the `serde` feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HtnConfig {
    /// Total work of one plan-queue pass per tick.
    pub queue_budget: TimeBudget,
    /// Work a single planning job may do per slice.
    pub job_budget: TimeBudget,
    /// Max agents updated per tick; the rest are served first on the next tick.
    pub max_updates_per_tick: usize,
    /// Seconds between plan requests.
    pub plan_cooldown: f32,
    /// Keep requesting plans on the cooldown while a plan executes.
    pub continuous_replan: bool,
    /// Task limit for a single search.
    pub max_tasks: usize,
    /// Max compound nesting accepted by registry validation.
    pub validation_depth: usize,
    pub seed: u64,
}

impl Default for HtnConfig {
    fn default() -> Self {
        Self {
            queue_budget: TimeBudget::Millis(4.0),
            job_budget: TimeBudget::Millis(20.0),
            max_updates_per_tick: 128,
            plan_cooldown: 0.45,
            continuous_replan: true,
            max_tasks: 1024,
            validation_depth: 64,
            seed: 0,
        }
    }
}

impl HtnConfig {
    /// Per-agent settings derived from these defaults.
    pub fn agent(&self, root: impl Into<TaskId>) -> AgentConfig {
        AgentConfig {
            root: root.into(),
            plan_cooldown: self.plan_cooldown,
            continuous_replan: self.continuous_replan,
            max_tasks: self.max_tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub root: TaskId,
    pub plan_cooldown: f32,
    pub continuous_replan: bool,
    pub max_tasks: usize,
}

impl AgentConfig {
    pub fn with_plan_cooldown(mut self, seconds: f32) -> Self {
        self.plan_cooldown = seconds;
        self
    }

    pub fn with_continuous_replan(mut self, continuous: bool) -> Self {
        self.continuous_replan = continuous;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }
}
