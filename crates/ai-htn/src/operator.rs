use std::rc::Rc;

use ai_core::{BbValue, Blackboard, Effects};
use tokio_util::sync::CancellationToken;

/// A side-effect-free test against the blackboard.
pub trait Precondition {
    fn is_met(&self, blackboard: &Blackboard) -> bool;
}

impl<F> Precondition for F
where
    F: Fn(&Blackboard) -> bool,
{
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        self(blackboard)
    }
}

pub(crate) fn all_met(preconditions: &[Rc<dyn Precondition>], blackboard: &Blackboard) -> bool {
    preconditions.iter().all(|p| p.is_met(blackboard))
}

/// The outcome of an operator during update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    Continuing,
    Failed,
    Finished,
    /// The plan this operator belonged to was replaced by a better one.
    BetterPlan,
}

/// Answer of [`Operator::plan`] during search.
#[derive(Clone)]
pub enum OperatorPlan {
    Rejected,
    Accepted(Option<Effects>),
}

impl OperatorPlan {
    pub fn accept() -> Self {
        OperatorPlan::Accepted(None)
    }

    pub fn with_effects(effects: Effects) -> Self {
        OperatorPlan::Accepted(Some(effects))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, OperatorPlan::Accepted(_))
    }
}

/// When an operator wants its [`Operator::conditional_shutdown`] to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCondition {
    /// As soon as its own step finishes successfully.
    TaskFinished,
    /// When the plan containing it is torn down, however that happens.
    PlanFinished,
}

/// Executable behaviour bound to a primitive task.
///
/// Operators are shared by every agent that plans with the task, so per-agent state belongs on
/// the blackboard, not in `self`.
pub trait Operator {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Planning-time check. Runs against the planner's private blackboard copy, which is
    /// read-only for the duration of the call. Long-running work should poll `cancel`.
    fn plan(&self, _blackboard: &Blackboard, _cancel: &CancellationToken) -> OperatorPlan {
        OperatorPlan::accept()
    }

    fn startup(&self, _blackboard: &mut Blackboard) {}

    fn update(&self, blackboard: &mut Blackboard, dt: f32) -> OperatorStatus;

    fn shutdown(&self, _blackboard: &mut Blackboard, _status: OperatorStatus) {}

    fn shutdown_condition(&self) -> Option<ShutdownCondition> {
        None
    }

    fn conditional_shutdown(&self, _blackboard: &mut Blackboard) {}
}

/// A periodic lookup whose result is cached on the blackboard.
pub trait Service {
    /// `None` clears the cached key.
    fn query(&self, blackboard: &Blackboard) -> Option<BbValue>;
}

impl<F> Service for F
where
    F: Fn(&Blackboard) -> Option<BbValue>,
{
    fn query(&self, blackboard: &Blackboard) -> Option<BbValue> {
        self(blackboard)
    }
}
