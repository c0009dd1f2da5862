//! YAML task network documents.
//!
//! ```yaml
//! root: root
//! tasks:
//!   - kind: compound
//!     id: root
//!     branches:
//!       - preconditions: [{ equals: { key: seen_enemy, value: true } }]
//!         tasks: [attack]
//!       - tasks: [wander]
//!   - kind: primitive
//!     id: attack
//!     operator: { type: custom, name: melee }
//!   - kind: primitive
//!     id: wander
//!     operator: { type: wait, duration: 2.0, key: wander_left }
//! ```
//!
//! Custom operators, services and preconditions are referenced by name and must be registered
//! on the [`DomainLoader`] first.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builtin::{KeyEquals, KeyExists, KeyMissing, Literal, Not, SetOperator, WaitOperator};
use crate::operator::{Operator, Precondition, Service};
use crate::registry::{RegistryError, TaskRegistry};
use crate::task::{
    Branch, CompoundTask, ParallelTask, PrimitiveTask, RepeatingTask, ServiceBinding, TaskId,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read domain file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid domain document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("task `{task}` uses unknown operator `{name}`")]
    UnknownOperator { task: String, name: String },
    #[error("task `{task}` uses unknown service `{name}`")]
    UnknownService { task: String, name: String },
    #[error("task `{task}` uses unknown precondition `{name}`")]
    UnknownPrecondition { task: String, name: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDoc {
    /// Default root task for tools.
    #[serde(default)]
    pub root: Option<String>,
    pub tasks: Vec<TaskDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskDoc {
    Compound {
        id: String,
        #[serde(default)]
        recursive: bool,
        branches: Vec<BranchDoc>,
    },
    Primitive {
        id: String,
        operator: OperatorDoc,
        #[serde(default)]
        preconditions: Vec<PreconditionDoc>,
        #[serde(default = "default_true")]
        apply_effects_on_startup: bool,
        #[serde(default)]
        services: Vec<ServiceDoc>,
    },
    Parallel {
        id: String,
        #[serde(default)]
        preconditions: Vec<PreconditionDoc>,
        tasks: Vec<String>,
    },
    Repeating {
        id: String,
        #[serde(default)]
        preconditions: Vec<PreconditionDoc>,
        tasks: Vec<String>,
    },
}

impl TaskDoc {
    pub fn id(&self) -> &str {
        match self {
            TaskDoc::Compound { id, .. }
            | TaskDoc::Primitive { id, .. }
            | TaskDoc::Parallel { id, .. }
            | TaskDoc::Repeating { id, .. } => id,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDoc {
    #[serde(default)]
    pub preconditions: Vec<PreconditionDoc>,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionDoc {
    Exists(String),
    Missing(String),
    Equals { key: String, value: Literal },
    Not(Box<PreconditionDoc>),
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperatorDoc {
    Set { key: String, value: Literal },
    Wait { duration: f32, key: String },
    Custom { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDoc {
    pub id: String,
    pub key: String,
    pub service: String,
    #[serde(default)]
    pub min_cooldown: f32,
    #[serde(default)]
    pub max_cooldown: f32,
}

/// Builds a [`TaskRegistry`] from [`DomainDoc`]s, resolving custom behaviour by name.
#[derive(Default)]
pub struct DomainLoader {
    operators: BTreeMap<String, Rc<dyn Operator>>,
    services: BTreeMap<String, Rc<dyn Service>>,
    preconditions: BTreeMap<String, Rc<dyn Precondition>>,
}

impl DomainLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operator(mut self, name: impl Into<String>, operator: impl Operator + 'static) -> Self {
        self.operators.insert(name.into(), Rc::new(operator));
        self
    }

    pub fn with_service(mut self, name: impl Into<String>, service: impl Service + 'static) -> Self {
        self.services.insert(name.into(), Rc::new(service));
        self
    }

    pub fn with_precondition(
        mut self,
        name: impl Into<String>,
        precondition: impl Precondition + 'static,
    ) -> Self {
        self.preconditions.insert(name.into(), Rc::new(precondition));
        self
    }

    pub fn parse(yaml: &str) -> Result<DomainDoc, LoadError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_str(&self, yaml: &str) -> Result<TaskRegistry, LoadError> {
        self.load(&Self::parse(yaml)?)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TaskRegistry, LoadError> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Register every task of `doc`. References between tasks are not checked here; run
    /// [`TaskRegistry::validate`] on the result.
    pub fn load(&self, doc: &DomainDoc) -> Result<TaskRegistry, LoadError> {
        let mut registry = TaskRegistry::new();
        for task in &doc.tasks {
            self.add_task(&mut registry, task)?;
        }
        Ok(registry)
    }

    fn add_task(&self, registry: &mut TaskRegistry, doc: &TaskDoc) -> Result<(), LoadError> {
        let task = doc.id();
        match doc {
            TaskDoc::Compound {
                id,
                recursive,
                branches,
            } => {
                let mut compound = CompoundTask::new(id.clone());
                compound.allow_recursion = *recursive;
                let branches = branches
                    .iter()
                    .map(|branch| {
                        Ok(Branch {
                            preconditions: self.preconditions(task, &branch.preconditions)?,
                            tasks: task_ids(&branch.tasks),
                        })
                    })
                    .collect::<Result<Vec<_>, LoadError>>()?;
                registry.add_compound(compound, branches)?;
            }
            TaskDoc::Primitive {
                id,
                operator,
                preconditions,
                apply_effects_on_startup,
                services,
            } => {
                let mut primitive =
                    PrimitiveTask::with_shared_operator(id.clone(), self.operator(task, operator)?)
                        .with_apply_effects_on_startup(*apply_effects_on_startup);
                primitive.preconditions = self.preconditions(task, preconditions)?;
                for service in services {
                    primitive.services.push(self.service(task, service)?);
                }
                registry.add_primitive(primitive)?;
            }
            TaskDoc::Parallel {
                id,
                preconditions,
                tasks,
            } => {
                let mut parallel = ParallelTask::new(id.clone(), task_ids(tasks));
                parallel.preconditions = self.preconditions(task, preconditions)?;
                registry.add_parallel(parallel)?;
            }
            TaskDoc::Repeating {
                id,
                preconditions,
                tasks,
            } => {
                let mut repeating = RepeatingTask::new(id.clone(), task_ids(tasks));
                repeating.preconditions = self.preconditions(task, preconditions)?;
                registry.add_repeating(repeating)?;
            }
        }
        Ok(())
    }

    fn operator(&self, task: &str, doc: &OperatorDoc) -> Result<Rc<dyn Operator>, LoadError> {
        let operator: Rc<dyn Operator> = match doc {
            OperatorDoc::Set { key, value } => Rc::new(SetOperator::new(key.clone(), value.clone())),
            OperatorDoc::Wait { duration, key } => Rc::new(WaitOperator::new(*duration, key.clone())),
            OperatorDoc::Custom { name } => {
                self.operators
                    .get(name)
                    .cloned()
                    .ok_or_else(|| LoadError::UnknownOperator {
                        task: task.to_string(),
                        name: name.clone(),
                    })?
            }
        };
        Ok(operator)
    }

    fn service(&self, task: &str, doc: &ServiceDoc) -> Result<ServiceBinding, LoadError> {
        let service = self
            .services
            .get(&doc.service)
            .cloned()
            .ok_or_else(|| LoadError::UnknownService {
                task: task.to_string(),
                name: doc.service.clone(),
            })?;
        Ok(ServiceBinding {
            id: Cow::Owned(doc.id.clone()),
            key: Cow::Owned(doc.key.clone()),
            min_cooldown: doc.min_cooldown.min(doc.max_cooldown),
            max_cooldown: doc.max_cooldown.max(doc.min_cooldown),
            service,
        })
    }

    fn preconditions(
        &self,
        task: &str,
        docs: &[PreconditionDoc],
    ) -> Result<Vec<Rc<dyn Precondition>>, LoadError> {
        docs.iter().map(|doc| self.precondition(task, doc)).collect()
    }

    fn precondition(&self, task: &str, doc: &PreconditionDoc) -> Result<Rc<dyn Precondition>, LoadError> {
        let precondition: Rc<dyn Precondition> = match doc {
            PreconditionDoc::Exists(key) => Rc::new(KeyExists::new(key.clone())),
            PreconditionDoc::Missing(key) => Rc::new(KeyMissing::new(key.clone())),
            PreconditionDoc::Equals { key, value } => Rc::new(KeyEquals::new(key.clone(), value.clone())),
            PreconditionDoc::Not(inner) => Rc::new(Not(self.precondition(task, inner)?)),
            PreconditionDoc::Custom(name) => self
                .preconditions
                .get(name)
                .cloned()
                .ok_or_else(|| LoadError::UnknownPrecondition {
                    task: task.to_string(),
                    name: name.clone(),
                })?,
        };
        Ok(precondition)
    }
}

fn task_ids(ids: &[String]) -> Vec<TaskId> {
    ids.iter().cloned().map(TaskId::from).collect()
}
