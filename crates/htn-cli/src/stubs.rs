//! Stand-ins for custom behaviour referenced by name in a domain file.
//!
//! Operators finish after one update, services clear their key and a precondition named `x`
//! is met while the blackboard holds `x = true`.

use std::collections::BTreeSet;

use ai_core::{BbValue, Blackboard};
use ai_htn::loader::{DomainDoc, OperatorDoc, PreconditionDoc, TaskDoc};
use ai_htn::{DomainLoader, Operator, OperatorStatus};

struct StubOperator(String);

impl Operator for StubOperator {
    fn name(&self) -> &str {
        &self.0
    }

    fn update(&self, _blackboard: &mut Blackboard, _dt: f32) -> OperatorStatus {
        tracing::debug!(operator = %self.0, "stub operator finished");
        OperatorStatus::Finished
    }
}

#[derive(Default)]
struct Names {
    operators: BTreeSet<String>,
    services: BTreeSet<String>,
    preconditions: BTreeSet<String>,
}

impl Names {
    fn precondition(&mut self, doc: &PreconditionDoc) {
        match doc {
            PreconditionDoc::Custom(name) => {
                self.preconditions.insert(name.clone());
            }
            PreconditionDoc::Not(inner) => self.precondition(inner),
            _ => {}
        }
    }

    fn preconditions(&mut self, docs: &[PreconditionDoc]) {
        docs.iter().for_each(|doc| self.precondition(doc));
    }
}

/// A loader with a stub registered for every custom name `doc` uses.
pub fn loader_for(doc: &DomainDoc) -> DomainLoader {
    let mut names = Names::default();
    for task in &doc.tasks {
        match task {
            TaskDoc::Compound { branches, .. } => {
                for branch in branches {
                    names.preconditions(&branch.preconditions);
                }
            }
            TaskDoc::Primitive {
                operator,
                preconditions,
                services,
                ..
            } => {
                if let OperatorDoc::Custom { name } = operator {
                    names.operators.insert(name.clone());
                }
                names.preconditions(preconditions);
                names
                    .services
                    .extend(services.iter().map(|s| s.service.clone()));
            }
            TaskDoc::Parallel { preconditions, .. } | TaskDoc::Repeating { preconditions, .. } => {
                names.preconditions(preconditions);
            }
        }
    }

    let mut loader = DomainLoader::new();
    for name in names.operators {
        loader = loader.with_operator(name.clone(), StubOperator(name));
    }
    for name in names.services {
        loader = loader.with_service(name, |_: &Blackboard| -> Option<BbValue> { None });
    }
    for name in names.preconditions {
        let key = name.clone();
        loader = loader.with_precondition(name, move |bb: &Blackboard| {
            bb.get_value(&key)
                .and_then(|v| v.downcast_ref::<bool>())
                .copied()
                .unwrap_or(false)
        });
    }
    loader
}
