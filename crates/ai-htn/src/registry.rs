use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::task::{
    Branch, CompoundTask, ParallelTask, PrimitiveTask, RepeatingTask, Task, TaskId, TaskKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} task `{id}` is defined twice")]
    DuplicateTask { id: TaskId, kind: TaskKind },
    #[error("task `{id}` referenced by `{referenced_by}` is not defined")]
    MissingTask { id: TaskId, referenced_by: TaskId },
    #[error("compound task `{id}` has no branches")]
    EmptyBranchSet { id: TaskId },
    #[error("compound task `{id}` reaches itself ({path}) but does not allow recursion")]
    Recursion { id: TaskId, path: String },
    #[error("decomposing `{root}` nests compound tasks deeper than {max_depth}")]
    DepthExceeded { root: TaskId, max_depth: usize },
    #[error("{kind} task `{id}` is invalid: {reason}")]
    InvalidComposite {
        id: TaskId,
        kind: TaskKind,
        reason: &'static str,
    },
}

/// Lookup table for every task definition and compound branch set.
///
/// Ids are unique per task kind. [`TaskRegistry::resolve`] looks a reference up as compound,
/// then primitive, parallel and repeating, in that order.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    compounds: BTreeMap<TaskId, Rc<CompoundTask>>,
    branches: BTreeMap<TaskId, Rc<[Branch]>>,
    primitives: BTreeMap<TaskId, Rc<PrimitiveTask>>,
    parallels: BTreeMap<TaskId, Rc<ParallelTask>>,
    repeatings: BTreeMap<TaskId, Rc<RepeatingTask>>,
}

fn insert_unique<T>(
    map: &mut BTreeMap<TaskId, Rc<T>>,
    id: TaskId,
    kind: TaskKind,
    task: T,
) -> Result<(), RegistryError> {
    if map.contains_key(&id) {
        return Err(RegistryError::DuplicateTask { id, kind });
    }
    map.insert(id, Rc::new(task));
    Ok(())
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compound(
        &mut self,
        task: CompoundTask,
        branches: Vec<Branch>,
    ) -> Result<(), RegistryError> {
        let id = task.id.clone();
        insert_unique(&mut self.compounds, id.clone(), TaskKind::Compound, task)?;
        self.branches.insert(id, branches.into());
        Ok(())
    }

    pub fn add_primitive(&mut self, task: PrimitiveTask) -> Result<(), RegistryError> {
        insert_unique(&mut self.primitives, task.id.clone(), TaskKind::Primitive, task)
    }

    pub fn add_parallel(&mut self, task: ParallelTask) -> Result<(), RegistryError> {
        insert_unique(&mut self.parallels, task.id.clone(), TaskKind::Parallel, task)
    }

    pub fn add_repeating(&mut self, task: RepeatingTask) -> Result<(), RegistryError> {
        insert_unique(&mut self.repeatings, task.id.clone(), TaskKind::Repeating, task)
    }

    pub fn compound(&self, id: &TaskId) -> Option<Rc<CompoundTask>> {
        self.compounds.get(id).cloned()
    }

    pub fn primitive(&self, id: &TaskId) -> Option<Rc<PrimitiveTask>> {
        self.primitives.get(id).cloned()
    }

    pub fn branches(&self, id: &TaskId) -> Option<Rc<[Branch]>> {
        self.branches.get(id).cloned()
    }

    pub fn resolve(&self, id: &TaskId) -> Option<Task> {
        if let Some(t) = self.compounds.get(id) {
            return Some(Task::Compound(t.clone()));
        }
        if let Some(t) = self.primitives.get(id) {
            return Some(Task::Primitive(t.clone()));
        }
        if let Some(t) = self.parallels.get(id) {
            return Some(Task::Parallel(t.clone()));
        }
        self.repeatings.get(id).map(|t| Task::Repeating(t.clone()))
    }

    pub fn len(&self) -> usize {
        self.compounds.len() + self.primitives.len() + self.parallels.len() + self.repeatings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn compound_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.compounds.keys()
    }

    /// Offline validation; returns the first problem found, in id order.
    pub fn validate(&self, max_depth: usize) -> Result<(), RegistryError> {
        match self.problems(max_depth).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every problem found by offline validation.
    pub fn problems(&self, max_depth: usize) -> Vec<RegistryError> {
        let mut problems = self.reference_problems();

        let mut heights = BTreeMap::new();
        for id in self.compounds.keys() {
            let mut path = Vec::new();
            if let Err(err) = self.visit(id, &mut path, &mut heights, max_depth) {
                if !problems.contains(&err) {
                    problems.push(err);
                }
            }
        }
        problems
    }

    fn reference_problems(&self) -> Vec<RegistryError> {
        let mut problems = Vec::new();
        let check = |id: &TaskId, referenced_by: &TaskId, problems: &mut Vec<RegistryError>| {
            if self.resolve(id).is_none() {
                problems.push(RegistryError::MissingTask {
                    id: id.clone(),
                    referenced_by: referenced_by.clone(),
                });
            }
        };

        for (id, branches) in &self.branches {
            if branches.is_empty() {
                problems.push(RegistryError::EmptyBranchSet { id: id.clone() });
            }
            for branch in branches.iter() {
                for task in &branch.tasks {
                    check(task, id, &mut problems);
                }
            }
        }

        for (id, parallel) in &self.parallels {
            for task in &parallel.tasks {
                check(task, id, &mut problems);
            }
            if parallel.tasks.len() < 2 {
                problems.push(RegistryError::InvalidComposite {
                    id: id.clone(),
                    kind: TaskKind::Parallel,
                    reason: "needs at least two tasks",
                });
            }
            let first_is_compound = parallel
                .tasks
                .first()
                .is_some_and(|first| self.compounds.contains_key(first));
            let members = if first_is_compound {
                &parallel.tasks[..0]
            } else {
                &parallel.tasks[..]
            };
            if members.iter().any(|t| self.resolve(t).is_some() && !self.primitives.contains_key(t)) {
                problems.push(RegistryError::InvalidComposite {
                    id: id.clone(),
                    kind: TaskKind::Parallel,
                    reason: "members after a leading primitive must be primitive",
                });
            }
        }

        for (id, repeating) in &self.repeatings {
            for task in &repeating.tasks {
                check(task, id, &mut problems);
            }
            if repeating.tasks.is_empty() {
                problems.push(RegistryError::InvalidComposite {
                    id: id.clone(),
                    kind: TaskKind::Repeating,
                    reason: "needs at least one task",
                });
            }
            if repeating
                .tasks
                .iter()
                .any(|t| self.resolve(t).is_some() && !self.primitives.contains_key(t))
            {
                problems.push(RegistryError::InvalidComposite {
                    id: id.clone(),
                    kind: TaskKind::Repeating,
                    reason: "members must be primitive",
                });
            }
        }

        problems
    }

    /// Compound tasks a branch may decompose into directly.
    fn compound_children<'a>(&'a self, branch: &'a Branch) -> impl Iterator<Item = TaskId> + 'a {
        branch.tasks.iter().filter_map(move |id| match self.resolve(id)? {
            Task::Compound(c) => Some(c.id.clone()),
            Task::Parallel(p) => p
                .tasks
                .first()
                .filter(|first| self.compounds.contains_key(*first))
                .cloned(),
            Task::Primitive(_) | Task::Repeating(_) => None,
        })
    }

    /// Depth-first walk over compound nesting. Returns the height of `id`'s subtree; heights of
    /// fully explored compounds are memoized in `heights`.
    fn visit(
        &self,
        id: &TaskId,
        path: &mut Vec<TaskId>,
        heights: &mut BTreeMap<TaskId, usize>,
        max_depth: usize,
    ) -> Result<usize, RegistryError> {
        let root = path.first().unwrap_or(id).clone();
        if let Some(height) = heights.get(id) {
            if path.len() + height > max_depth {
                return Err(RegistryError::DepthExceeded { root, max_depth });
            }
            return Ok(*height);
        }
        if path.len() >= max_depth {
            return Err(RegistryError::DepthExceeded { root, max_depth });
        }

        path.push(id.clone());
        let mut height = 1;
        let branches = self.branches(id).unwrap_or_else(|| Rc::from(Vec::new()));
        for branch in branches.iter() {
            for child in self.compound_children(branch) {
                if let Some(pos) = path.iter().position(|p| *p == child) {
                    let allowed = self.compounds.get(&child).is_some_and(|c| c.allow_recursion);
                    if allowed {
                        continue;
                    }
                    let mut cycle: Vec<&str> = path[pos..].iter().map(TaskId::as_str).collect();
                    cycle.push(child.as_str());
                    return Err(RegistryError::Recursion {
                        id: child.clone(),
                        path: cycle.join(" -> "),
                    });
                }
                let child_height = self.visit(&child, path, heights, max_depth)?;
                height = height.max(child_height + 1);
            }
        }
        path.pop();
        heights.insert(id.clone(), height);
        Ok(height)
    }
}
