use ai_core::Blackboard;
use ai_htn::{
    Branch, CompoundTask, Operator, OperatorStatus, ParallelTask, PrimitiveTask, RegistryError,
    RepeatingTask, TaskId, TaskKind, TaskRegistry,
};

struct Done;

impl Operator for Done {
    fn update(&self, _blackboard: &mut Blackboard, _dt: f32) -> OperatorStatus {
        OperatorStatus::Finished
    }
}

fn compound(r: &mut TaskRegistry, id: &'static str, branches: Vec<Vec<&'static str>>) {
    r.add_compound(
        CompoundTask::new(id),
        branches.into_iter().map(Branch::new).collect(),
    )
    .unwrap();
}

fn primitive(r: &mut TaskRegistry, id: &'static str) {
    r.add_primitive(PrimitiveTask::new(id, Done)).unwrap();
}

#[test]
fn resolves_by_kind_regardless_of_definition_order() {
    let mut r = TaskRegistry::new();
    compound(&mut r, "root", vec![vec!["later"]]);
    primitive(&mut r, "later");

    assert_eq!(r.len(), 2);
    assert_eq!(r.resolve(&TaskId::new("root")).map(|t| t.kind()), Some(TaskKind::Compound));
    assert_eq!(r.resolve(&TaskId::new("later")).map(|t| t.kind()), Some(TaskKind::Primitive));
    assert!(r.resolve(&TaskId::new("nope")).is_none());
    assert!(r.validate(8).is_ok());
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut r = TaskRegistry::new();
    primitive(&mut r, "a");
    let err = r.add_primitive(PrimitiveTask::new("a", Done)).unwrap_err();
    assert_eq!(
        err,
        RegistryError::DuplicateTask {
            id: TaskId::new("a"),
            kind: TaskKind::Primitive,
        }
    );
}

#[test]
fn reports_missing_references_and_empty_branch_sets() {
    let mut r = TaskRegistry::new();
    compound(&mut r, "root", vec![vec!["ghost"]]);
    compound(&mut r, "hollow", vec![]);

    let problems = r.problems(8);
    assert!(problems.contains(&RegistryError::MissingTask {
        id: TaskId::new("ghost"),
        referenced_by: TaskId::new("root"),
    }));
    assert!(problems.contains(&RegistryError::EmptyBranchSet {
        id: TaskId::new("hollow"),
    }));
    assert!(r.validate(8).is_err());
}

#[test]
fn unflagged_recursion_is_a_load_error() {
    let mut r = TaskRegistry::new();
    compound(&mut r, "a", vec![vec!["b"]]);
    compound(&mut r, "b", vec![vec!["a"]]);

    let err = r.validate(16).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Recursion {
            id: TaskId::new("a"),
            path: "a -> b -> a".to_string(),
        }
    );
}

#[test]
fn flagged_recursion_is_allowed() {
    let mut r = TaskRegistry::new();
    r.add_compound(
        CompoundTask::new("patrol").recursive(),
        vec![Branch::new(["step", "patrol"]), Branch::new(["step"])],
    )
    .unwrap();
    primitive(&mut r, "step");

    assert!(r.validate(16).is_ok());
}

#[test]
fn nesting_depth_is_bounded() {
    let mut r = TaskRegistry::new();
    compound(&mut r, "c0", vec![vec!["c1"]]);
    compound(&mut r, "c1", vec![vec!["c2"]]);
    compound(&mut r, "c2", vec![vec!["leaf"]]);
    primitive(&mut r, "leaf");

    assert_eq!(
        r.validate(2).unwrap_err(),
        RegistryError::DepthExceeded {
            root: TaskId::new("c0"),
            max_depth: 2,
        }
    );
    assert!(r.validate(3).is_ok());
}

#[test]
fn composite_membership_rules() {
    let mut r = TaskRegistry::new();
    primitive(&mut r, "x");
    primitive(&mut r, "y");
    compound(&mut r, "plan_x", vec![vec!["x"]]);
    r.add_parallel(ParallelTask::new("solo", ["x"])).unwrap();
    r.add_parallel(ParallelTask::new("mixed", ["x", "plan_x"])).unwrap();
    r.add_parallel(ParallelTask::new("led", ["plan_x", "y"])).unwrap();
    r.add_repeating(RepeatingTask::new("empty", Vec::<&'static str>::new()))
        .unwrap();
    r.add_repeating(RepeatingTask::new("deep", ["plan_x"])).unwrap();
    r.add_repeating(RepeatingTask::new("fine", ["x", "y"])).unwrap();

    let invalid: Vec<(String, TaskKind)> = r
        .problems(8)
        .into_iter()
        .filter_map(|p| match p {
            RegistryError::InvalidComposite { id, kind, .. } => Some((id.to_string(), kind)),
            _ => None,
        })
        .collect();

    assert!(invalid.contains(&("solo".to_string(), TaskKind::Parallel)));
    assert!(invalid.contains(&("mixed".to_string(), TaskKind::Parallel)));
    assert!(!invalid.iter().any(|(id, _)| id == "led"));
    assert!(invalid.contains(&("empty".to_string(), TaskKind::Repeating)));
    assert!(invalid.contains(&("deep".to_string(), TaskKind::Repeating)));
    assert!(!invalid.iter().any(|(id, _)| id == "fine"));
}
