//! Decomposition search with backtracking, run as a time-sliced [`Job`].
//!
//! The search keeps its whole state in explicit stacks on [`HtnPlanJob`], so it can suspend
//! after any single task evaluation and resume exactly where it stopped.

use std::rc::Rc;

use ai_core::{run_to_completion, Blackboard, BlackboardError, Effects, Job, JobPoll, Slice};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::operator::{all_met, OperatorPlan, Precondition};
use crate::plan::{Plan, PlanStep};
use crate::registry::TaskRegistry;
use crate::task::{CompoundTask, PrimitiveTask, Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("planning `{root}` processed more than {limit} tasks")]
    TaskLimitExceeded { root: TaskId, limit: usize },
    #[error("task `{id}` is not registered")]
    UnknownTask { id: TaskId },
    #[error("compound task `{id}` has no branch set")]
    NoBranches { id: TaskId },
    #[error("`{member}` in composite task `{id}` is not a primitive task")]
    InvalidMember { id: TaskId, member: TaskId },
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtnPlannerConfig {
    /// Max number of tasks processed by one search before it is aborted as malformed.
    pub max_tasks: usize,
}

impl Default for HtnPlannerConfig {
    fn default() -> Self {
        Self { max_tasks: 1024 }
    }
}

/// Rollback point recorded each time a compound task is expanded.
struct DecompositionState {
    compound: Rc<CompoundTask>,
    branch: usize,
    blackboard: Blackboard,
    step_count: usize,
    /// The processing stack as it was before the branch's sub-tasks were pushed.
    pending: Vec<Task>,
}

/// A resumable planning search for one agent.
///
/// Owns a private blackboard copy; nothing it does is visible to the agent until the plan is
/// adopted.
pub struct HtnPlanJob {
    registry: Rc<TaskRegistry>,
    root: TaskId,
    blackboard: Blackboard,
    bias: Option<Vec<usize>>,
    cancel: CancellationToken,
    max_tasks: usize,

    started: bool,
    to_process: Vec<Task>,
    steps: Vec<PlanStep>,
    effects: Vec<Option<Effects>>,
    history: Vec<DecompositionState>,
    branch_cursor: usize,
    processed: usize,
    rollbacks: usize,
    last_rollback_len: Option<usize>,
}

enum Outcome {
    Continue,
    Rollback,
}

impl HtnPlanJob {
    pub fn new(registry: Rc<TaskRegistry>, root: impl Into<TaskId>, blackboard: Blackboard) -> Self {
        Self {
            registry,
            root: root.into(),
            blackboard,
            bias: None,
            cancel: CancellationToken::new(),
            max_tasks: HtnPlannerConfig::default().max_tasks,
            started: false,
            to_process: Vec::new(),
            steps: Vec::new(),
            effects: Vec::new(),
            history: Vec::new(),
            branch_cursor: 0,
            processed: 0,
            rollbacks: 0,
            last_rollback_len: None,
        }
    }

    /// The branch-traversal record of the plan currently being executed.
    ///
    /// Kept for introspection only: the search itself is unaffected, and the caller compares
    /// the finished plan against the current one.
    pub fn with_bias(mut self, bias: Option<Vec<usize>>) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    pub fn root(&self) -> &TaskId {
        &self.root
    }

    pub fn bias(&self) -> Option<&[usize]> {
        self.bias.as_deref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Tasks popped so far.
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    /// Length of the candidate plan right after the most recent rollback.
    pub fn last_rollback_len(&self) -> Option<usize> {
        self.last_rollback_len
    }

    /// Steps accepted into the candidate plan so far.
    pub fn candidate_len(&self) -> usize {
        self.steps.len()
    }

    pub fn decomposition_depth(&self) -> usize {
        self.history.len()
    }

    fn resolve(&self, id: &TaskId) -> Result<Task, PlanError> {
        self.registry
            .resolve(id)
            .ok_or_else(|| PlanError::UnknownTask { id: id.clone() })
    }

    fn resolve_primitive(&self, owner: &TaskId, id: &TaskId) -> Result<Rc<PrimitiveTask>, PlanError> {
        match self.resolve(id)? {
            Task::Primitive(p) => Ok(p),
            _ => Err(PlanError::InvalidMember {
                id: owner.clone(),
                member: id.clone(),
            }),
        }
    }

    fn process(&mut self, task: Task) -> Result<Outcome, PlanError> {
        match task {
            Task::Compound(compound) => self.decompose(compound),
            Task::Primitive(primitive) => match self.try_primitives(&[], std::slice::from_ref(&primitive))? {
                Some(effects) => {
                    self.accept(PlanStep::Primitive(primitive), effects);
                    Ok(Outcome::Continue)
                }
                None => Ok(Outcome::Rollback),
            },
            Task::Parallel(parallel) => {
                if let Some(first) = parallel.tasks.first() {
                    if let Task::Compound(compound) = self.resolve(first)? {
                        self.to_process.push(Task::Compound(compound));
                        return Ok(Outcome::Continue);
                    }
                }
                let members = parallel
                    .tasks
                    .iter()
                    .map(|id| self.resolve_primitive(&parallel.id, id))
                    .collect::<Result<Vec<_>, _>>()?;
                match self.try_primitives(&parallel.preconditions, &members)? {
                    Some(effects) => {
                        self.accept(PlanStep::Parallel { task: parallel, members }, effects);
                        Ok(Outcome::Continue)
                    }
                    None => Ok(Outcome::Rollback),
                }
            }
            Task::Repeating(repeating) => {
                let members = repeating
                    .tasks
                    .iter()
                    .map(|id| self.resolve_primitive(&repeating.id, id))
                    .collect::<Result<Vec<_>, _>>()?;
                match self.try_primitives(&repeating.preconditions, &members)? {
                    Some(effects) => {
                        self.accept(PlanStep::Repeating { task: repeating, members }, effects);
                        Ok(Outcome::Continue)
                    }
                    None => Ok(Outcome::Rollback),
                }
            }
        }
    }

    /// Expand `compound` with its first satisfied branch at or after the branch cursor.
    fn decompose(&mut self, compound: Rc<CompoundTask>) -> Result<Outcome, PlanError> {
        let branches = self
            .registry
            .branches(&compound.id)
            .ok_or_else(|| PlanError::NoBranches {
                id: compound.id.clone(),
            })?;

        self.blackboard.set_read_only(true);
        let chosen = branches
            .iter()
            .enumerate()
            .skip(self.branch_cursor)
            .find(|(_, branch)| branch.is_satisfied(&self.blackboard))
            .map(|(index, _)| index);
        self.blackboard.set_read_only(false);

        let Some(index) = chosen else {
            return Ok(Outcome::Rollback);
        };

        let subtasks = branches[index]
            .tasks
            .iter()
            .map(|id| self.resolve(id))
            .collect::<Result<Vec<_>, _>>()?;

        self.history.push(DecompositionState {
            compound,
            branch: index,
            blackboard: self.blackboard.clone(),
            step_count: self.steps.len(),
            pending: self.to_process.clone(),
        });
        self.to_process.extend(subtasks.into_iter().rev());
        self.branch_cursor = 0;
        Ok(Outcome::Continue)
    }

    /// Check `preconditions` and every member's preconditions and operator, applying accepted
    /// effects to the planning blackboard in member order.
    ///
    /// Returns `None` when anything rejects, otherwise the merged effects (if any).
    fn try_primitives(
        &mut self,
        preconditions: &[Rc<dyn Precondition>],
        members: &[Rc<PrimitiveTask>],
    ) -> Result<Option<Option<Effects>>, PlanError> {
        let mut merged: Option<Effects> = None;

        self.blackboard.set_read_only(true);
        if !all_met(preconditions, &self.blackboard) {
            self.blackboard.set_read_only(false);
            return Ok(None);
        }

        for member in members {
            self.blackboard.set_read_only(true);
            let answer = if member.preconditions_met(&self.blackboard) {
                member.operator.plan(&self.blackboard, &self.cancel)
            } else {
                OperatorPlan::Rejected
            };
            self.blackboard.set_read_only(false);

            match answer {
                OperatorPlan::Rejected => return Ok(None),
                OperatorPlan::Accepted(None) => {}
                OperatorPlan::Accepted(Some(effects)) => {
                    self.blackboard.apply(&effects)?;
                    merged.get_or_insert_with(Effects::new).extend(effects);
                }
            }
        }

        Ok(Some(merged))
    }

    fn accept(&mut self, step: PlanStep, effects: Option<Effects>) {
        self.steps.push(step);
        self.effects.push(effects);
    }

    /// Restore the most recent decomposition point and retry its compound task from the next
    /// branch. Returns `false` when there is nothing left to try.
    fn rollback(&mut self) -> bool {
        let Some(state) = self.history.pop() else {
            return false;
        };

        self.steps.truncate(state.step_count);
        self.effects.truncate(state.step_count);
        self.blackboard = state.blackboard;
        self.to_process = state.pending;
        self.to_process.push(Task::Compound(state.compound));
        self.branch_cursor = state.branch + 1;
        self.rollbacks += 1;
        self.last_rollback_len = Some(self.steps.len());
        true
    }

    fn finish(&mut self) -> Option<Plan> {
        if self.steps.is_empty() {
            return None;
        }
        let branch_traversal = self.history.iter().map(|s| s.branch).collect();
        Some(Plan::new(
            std::mem::take(&mut self.steps),
            std::mem::take(&mut self.effects),
            branch_traversal,
        ))
    }
}

impl Job for HtnPlanJob {
    type Output = Option<Plan>;
    type Error = PlanError;

    fn run(&mut self, slice: &mut Slice) -> JobPoll<Result<Option<Plan>, PlanError>> {
        if !self.started {
            self.started = true;
            match self.resolve(&self.root) {
                Ok(root) => self.to_process.push(root),
                Err(err) => return JobPoll::Ready(Err(err)),
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                return JobPoll::Ready(Ok(None));
            }

            let Some(task) = self.to_process.pop() else {
                return JobPoll::Ready(Ok(self.finish()));
            };

            self.processed += 1;
            if self.processed > self.max_tasks {
                return JobPoll::Ready(Err(PlanError::TaskLimitExceeded {
                    root: self.root.clone(),
                    limit: self.max_tasks,
                }));
            }

            match self.process(task) {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Rollback) => {
                    if !self.rollback() {
                        return JobPoll::Ready(Ok(None));
                    }
                }
                Err(err) => return JobPoll::Ready(Err(err)),
            }

            if slice.consume() {
                return JobPoll::Pending;
            }
        }
    }
}

/// Synchronous facade over [`HtnPlanJob`].
pub struct HtnPlanner {
    registry: Rc<TaskRegistry>,
    config: HtnPlannerConfig,
}

impl HtnPlanner {
    pub fn new(registry: Rc<TaskRegistry>) -> Self {
        Self {
            registry,
            config: HtnPlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HtnPlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Rc<TaskRegistry> {
        &self.registry
    }

    /// A job planning `root` against a copy of `blackboard`.
    pub fn job(&self, root: impl Into<TaskId>, blackboard: &Blackboard) -> HtnPlanJob {
        HtnPlanJob::new(self.registry.clone(), root, blackboard.clone())
            .with_max_tasks(self.config.max_tasks)
    }

    /// Plan `root` to completion. `Ok(None)` means no decomposition satisfies the blackboard.
    pub fn plan(
        &self,
        root: impl Into<TaskId>,
        blackboard: &Blackboard,
    ) -> Result<Option<Plan>, PlanError> {
        let mut job = self.job(root, blackboard);
        run_to_completion(&mut job)
    }
}
