//! Immutable task network definitions.
//!
//! Tasks refer to each other by [`TaskId`]; references are resolved through the
//! [`TaskRegistry`](crate::TaskRegistry) at plan time, so definitions may appear in any order.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use ai_core::Blackboard;

use crate::operator::{all_met, Operator, Precondition, Service};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(Cow<'static, str>);

impl TaskId {
    pub const fn new(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TaskId {
    fn from(id: &'static str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(Cow::Owned(id))
    }
}

impl From<&TaskId> for TaskId {
    fn from(id: &TaskId) -> Self {
        id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    Compound,
    Primitive,
    Parallel,
    Repeating,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Compound => "compound",
            TaskKind::Primitive => "primitive",
            TaskKind::Parallel => "parallel",
            TaskKind::Repeating => "repeating",
        })
    }
}

/// One alternative decomposition of a compound task (a "method").
#[derive(Clone, Default)]
pub struct Branch {
    pub preconditions: Vec<Rc<dyn Precondition>>,
    pub tasks: Vec<TaskId>,
}

impl Branch {
    pub fn new<I, T>(tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        Self {
            preconditions: Vec::new(),
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_precondition(mut self, precondition: impl Precondition + 'static) -> Self {
        self.preconditions.push(Rc::new(precondition));
        self
    }

    pub fn is_satisfied(&self, blackboard: &Blackboard) -> bool {
        all_met(&self.preconditions, blackboard)
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("preconditions", &self.preconditions.len())
            .field("tasks", &self.tasks)
            .finish()
    }
}

/// A task that expands into one of its branches. The branch set lives in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundTask {
    pub id: TaskId,
    /// Permits this task to be reached again from its own branches.
    pub allow_recursion: bool,
}

impl CompoundTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            allow_recursion: false,
        }
    }

    pub fn recursive(mut self) -> Self {
        self.allow_recursion = true;
        self
    }
}

/// Binds a [`Service`] to a blackboard key on a cooldown drawn from `[min_cooldown, max_cooldown]`.
#[derive(Clone)]
pub struct ServiceBinding {
    pub id: Cow<'static, str>,
    pub key: Cow<'static, str>,
    pub min_cooldown: f32,
    pub max_cooldown: f32,
    pub service: Rc<dyn Service>,
}

impl ServiceBinding {
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        key: impl Into<Cow<'static, str>>,
        service: impl Service + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            min_cooldown: 0.0,
            max_cooldown: 0.0,
            service: Rc::new(service),
        }
    }

    pub fn with_cooldown(mut self, min: f32, max: f32) -> Self {
        self.min_cooldown = min.min(max);
        self.max_cooldown = max.max(min);
        self
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("min_cooldown", &self.min_cooldown)
            .field("max_cooldown", &self.max_cooldown)
            .finish_non_exhaustive()
    }
}

/// A leaf action.
#[derive(Clone)]
pub struct PrimitiveTask {
    pub id: TaskId,
    pub preconditions: Vec<Rc<dyn Precondition>>,
    pub operator: Rc<dyn Operator>,
    /// Write the effects captured while planning to the live blackboard when the step starts.
    pub apply_effects_on_startup: bool,
    pub services: Vec<ServiceBinding>,
}

impl PrimitiveTask {
    pub fn new(id: impl Into<TaskId>, operator: impl Operator + 'static) -> Self {
        Self::with_shared_operator(id, Rc::new(operator))
    }

    pub fn with_shared_operator(id: impl Into<TaskId>, operator: Rc<dyn Operator>) -> Self {
        Self {
            id: id.into(),
            preconditions: Vec::new(),
            operator,
            apply_effects_on_startup: true,
            services: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, precondition: impl Precondition + 'static) -> Self {
        self.preconditions.push(Rc::new(precondition));
        self
    }

    pub fn with_service(mut self, service: ServiceBinding) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_apply_effects_on_startup(mut self, apply: bool) -> Self {
        self.apply_effects_on_startup = apply;
        self
    }

    pub fn preconditions_met(&self, blackboard: &Blackboard) -> bool {
        all_met(&self.preconditions, blackboard)
    }
}

impl fmt::Debug for PrimitiveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveTask")
            .field("id", &self.id)
            .field("operator", &self.operator.name())
            .field("preconditions", &self.preconditions.len())
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

/// Runs its members side by side; the step ends as soon as any member finishes or fails.
///
/// When the first member is a compound task, planning decomposes that task instead.
#[derive(Clone)]
pub struct ParallelTask {
    pub id: TaskId,
    pub preconditions: Vec<Rc<dyn Precondition>>,
    pub tasks: Vec<TaskId>,
}

/// Runs its members in order, starting over after the last, until one fails.
#[derive(Clone)]
pub struct RepeatingTask {
    pub id: TaskId,
    pub preconditions: Vec<Rc<dyn Precondition>>,
    pub tasks: Vec<TaskId>,
}

macro_rules! composite_task {
    ($ty:ident) => {
        impl $ty {
            pub fn new<I, T>(id: impl Into<TaskId>, tasks: I) -> Self
            where
                I: IntoIterator<Item = T>,
                T: Into<TaskId>,
            {
                Self {
                    id: id.into(),
                    preconditions: Vec::new(),
                    tasks: tasks.into_iter().map(Into::into).collect(),
                }
            }

            pub fn with_precondition(mut self, precondition: impl Precondition + 'static) -> Self {
                self.preconditions.push(Rc::new(precondition));
                self
            }

            pub fn preconditions_met(&self, blackboard: &Blackboard) -> bool {
                all_met(&self.preconditions, blackboard)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.id)
                    .field("preconditions", &self.preconditions.len())
                    .field("tasks", &self.tasks)
                    .finish()
            }
        }
    };
}

composite_task!(ParallelTask);
composite_task!(RepeatingTask);

/// A resolved task definition.
#[derive(Debug, Clone)]
pub enum Task {
    Compound(Rc<CompoundTask>),
    Primitive(Rc<PrimitiveTask>),
    Parallel(Rc<ParallelTask>),
    Repeating(Rc<RepeatingTask>),
}

impl Task {
    pub fn id(&self) -> &TaskId {
        match self {
            Task::Compound(t) => &t.id,
            Task::Primitive(t) => &t.id,
            Task::Parallel(t) => &t.id,
            Task::Repeating(t) => &t.id,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Compound(_) => TaskKind::Compound,
            Task::Primitive(_) => TaskKind::Primitive,
            Task::Parallel(_) => TaskKind::Parallel,
            Task::Repeating(_) => TaskKind::Repeating,
        }
    }
}
