use std::fmt;
use std::rc::Rc;

use ai_core::Effects;

use crate::task::{ParallelTask, PrimitiveTask, RepeatingTask, TaskId};

/// One executable entry of a plan.
///
/// Composite steps carry their members already resolved, so execution never consults the
/// registry.
#[derive(Clone)]
pub enum PlanStep {
    Primitive(Rc<PrimitiveTask>),
    Parallel {
        task: Rc<ParallelTask>,
        members: Vec<Rc<PrimitiveTask>>,
    },
    Repeating {
        task: Rc<RepeatingTask>,
        members: Vec<Rc<PrimitiveTask>>,
    },
}

impl PlanStep {
    pub fn id(&self) -> &TaskId {
        match self {
            PlanStep::Primitive(p) => &p.id,
            PlanStep::Parallel { task, .. } => &task.id,
            PlanStep::Repeating { task, .. } => &task.id,
        }
    }

    /// Every primitive this step may run.
    pub fn primitives(&self) -> &[Rc<PrimitiveTask>] {
        match self {
            PlanStep::Primitive(p) => std::slice::from_ref(p),
            PlanStep::Parallel { members, .. } | PlanStep::Repeating { members, .. } => members,
        }
    }
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Primitive(p) => write!(f, "Primitive({})", p.id),
            PlanStep::Parallel { task, .. } => write!(f, "Parallel({})", task.id),
            PlanStep::Repeating { task, .. } => write!(f, "Repeating({})", task.id),
        }
    }
}

/// The result of a successful planning job.
///
/// `effects[i]` holds the blackboard writes captured while planning `steps[i]`.
/// `branch_traversal` holds the branch index chosen at each decomposition, in decomposition
/// order.
#[derive(Clone)]
pub struct Plan {
    steps: Vec<PlanStep>,
    effects: Vec<Option<Effects>>,
    branch_traversal: Vec<usize>,
    index: usize,
    /// Position inside the current repeating step.
    pub(crate) member: usize,
}

impl Plan {
    pub fn new(
        steps: Vec<PlanStep>,
        effects: Vec<Option<Effects>>,
        branch_traversal: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(steps.len(), effects.len());
        Self {
            steps,
            effects,
            branch_traversal,
            index: 0,
            member: 0,
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn effects(&self) -> &[Option<Effects>] {
        &self.effects
    }

    pub fn branch_traversal(&self) -> &[usize] {
        &self.branch_traversal
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id().as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_step(&self) -> Option<&PlanStep> {
        self.steps.get(self.index)
    }

    pub fn current_effects(&self) -> Option<&Effects> {
        self.effects.get(self.index)?.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.steps.len()
    }

    /// Move the cursor to the next step. Returns `false` once the plan is exhausted.
    pub fn advance(&mut self) -> bool {
        self.index = self.index.saturating_add(1).min(self.steps.len());
        self.member = 0;
        !self.is_finished()
    }

    /// Whether this plan should replace `current`. See [`is_better_traversal`].
    pub fn is_better_than(&self, current: &Plan) -> bool {
        is_better_traversal(&self.branch_traversal, &current.branch_traversal)
    }
}

impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.branch_traversal == other.branch_traversal
            && self.steps.len() == other.steps.len()
            && self.steps.iter().zip(&other.steps).all(|(a, b)| a.id() == b.id())
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("steps", &self.steps)
            .field("branch_traversal", &self.branch_traversal)
            .field("index", &self.index)
            .finish()
    }
}

/// Plan preference by branch-traversal record.
///
/// Lower branch indices are preferred. The records are compared element by element and the
/// first differing position decides. Records with no differing position are a tie, and a
/// tie accepts the new plan whether the records are identical or one is a prefix of the other.
pub fn is_better_traversal(new: &[usize], current: &[usize]) -> bool {
    match new.iter().zip(current).find(|(n, c)| n != c) {
        Some((n, c)) => n < c,
        None => true,
    }
}
