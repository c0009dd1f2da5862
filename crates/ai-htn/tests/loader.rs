use std::rc::Rc;

use ai_core::{BbKey, BbValue, Blackboard, TimeBudget};
use ai_htn::{
    DomainLoader, HtnConfig, HtnPlanner, LoadError, Operator, OperatorStatus, PlanStep, TaskId,
    TaskKind,
};

const DOMAIN: &str = r#"
root: root
tasks:
  - kind: compound
    id: root
    branches:
      - preconditions:
          - equals: { key: seen_enemy, value: true }
        tasks: [attack]
      - preconditions:
          - not: { custom: tired }
        tasks: [patrol]
      - tasks: [rest]
  - kind: primitive
    id: attack
    operator: { type: custom, name: melee }
    services:
      - { id: nearest, key: target, service: nearest_enemy, min_cooldown: 0.5, max_cooldown: 1.0 }
  - kind: repeating
    id: patrol
    tasks: [mark, pause]
  - kind: primitive
    id: mark
    operator: { type: set, key: patrolled, value: 3 }
  - kind: primitive
    id: pause
    apply_effects_on_startup: false
    operator: { type: wait, duration: 1.5, key: pause_left }
  - kind: primitive
    id: rest
    preconditions: [{ missing: target }]
    operator: { type: wait, duration: 3.0, key: rest_left }
"#;

const SEEN_ENEMY: BbKey<bool> = BbKey::new("seen_enemy");
const TIRED: BbKey<bool> = BbKey::new("tired");

struct Melee;

impl Operator for Melee {
    fn name(&self) -> &str {
        "melee"
    }

    fn update(&self, _blackboard: &mut Blackboard, _dt: f32) -> OperatorStatus {
        OperatorStatus::Continuing
    }
}

fn loader() -> DomainLoader {
    DomainLoader::new()
        .with_operator("melee", Melee)
        .with_service("nearest_enemy", |_: &Blackboard| -> Option<BbValue> { None })
        .with_precondition("tired", |bb: &Blackboard| bb.contains(TIRED))
}

#[test]
fn loads_and_validates_a_domain() {
    let doc = DomainLoader::parse(DOMAIN).unwrap();
    assert_eq!(doc.root.as_deref(), Some("root"));
    assert_eq!(doc.tasks.len(), 6);

    let registry = loader().load(&doc).unwrap();
    registry.validate(16).unwrap();

    let attack = registry.primitive(&TaskId::new("attack")).unwrap();
    assert_eq!(attack.operator.name(), "melee");
    assert_eq!(attack.services.len(), 1);
    assert_eq!(attack.services[0].min_cooldown, 0.5);
    assert_eq!(
        registry.resolve(&TaskId::new("patrol")).map(|t| t.kind()),
        Some(TaskKind::Repeating)
    );
    assert!(!registry.primitive(&TaskId::new("pause")).unwrap().apply_effects_on_startup);
}

#[test]
fn loaded_domain_plans_like_a_hand_built_one() {
    let planner = HtnPlanner::new(Rc::new(loader().load_str(DOMAIN).unwrap()));

    let mut bb = Blackboard::new();
    let plan = planner.plan("root", &bb).unwrap().expect("plan");
    assert_eq!(plan.task_ids(), vec!["patrol"]);
    assert!(matches!(&plan.steps()[0], PlanStep::Repeating { members, .. } if members.len() == 2));
    let effects = plan.effects()[0].as_ref().expect("effects");
    let patrolled = effects.get("patrolled").and_then(|v| v.downcast_ref::<i64>());
    assert_eq!(patrolled, Some(&3));

    bb.set(TIRED, true).unwrap();
    let plan = planner.plan("root", &bb).unwrap().expect("plan");
    assert_eq!(plan.task_ids(), vec!["rest"]);

    bb.set(SEEN_ENEMY, true).unwrap();
    let plan = planner.plan("root", &bb).unwrap().expect("plan");
    assert_eq!(plan.task_ids(), vec!["attack"]);
    assert_eq!(plan.branch_traversal(), &[0]);
}

#[test]
fn unknown_names_are_reported() {
    let err = DomainLoader::new().load_str(DOMAIN).unwrap_err();
    assert!(matches!(
        err,
        LoadError::UnknownPrecondition { ref task, ref name } if task == "root" && name == "tired"
    ));

    let err = DomainLoader::new()
        .with_precondition("tired", |_: &Blackboard| false)
        .load_str(DOMAIN)
        .unwrap_err();
    assert!(matches!(err, LoadError::UnknownOperator { ref name, .. } if name == "melee"));
}

#[test]
fn malformed_documents_fail_to_parse() {
    let err = DomainLoader::parse("tasks:\n  - kind: sideways\n    id: x\n").unwrap_err();
    assert!(matches!(err, LoadError::Yaml(_)));
}

#[test]
fn config_fills_missing_fields_with_defaults() {
    let yaml = "max_updates_per_tick: 8\njob_budget: { steps: 16 }\nqueue_budget: unlimited\n";
    let config: HtnConfig = serde_yaml::from_str(yaml).unwrap();
    let defaults = HtnConfig::default();

    assert_eq!(config.max_updates_per_tick, 8);
    assert_eq!(config.job_budget, TimeBudget::Steps(16));
    assert_eq!(config.queue_budget, TimeBudget::Unlimited);
    assert_eq!(config.plan_cooldown, defaults.plan_cooldown);
    assert_eq!(config.max_tasks, defaults.max_tasks);
}
