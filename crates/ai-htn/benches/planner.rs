use std::rc::Rc;

use ai_core::{Blackboard, Job, JobPoll, TimeBudget};
use ai_htn::{
    Branch, CompoundTask, HtnPlanJob, HtnPlanner, KeyMissing, Operator, OperatorStatus,
    PrimitiveTask, SetOperator, TaskRegistry,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

struct Step;

impl Operator for Step {
    fn update(&self, _blackboard: &mut Blackboard, _dt: f32) -> OperatorStatus {
        OperatorStatus::Finished
    }
}

/// `root` expands into `steps` primitives.
fn wide(steps: usize) -> Rc<TaskRegistry> {
    let mut r = TaskRegistry::new();
    r.add_compound(
        CompoundTask::new("root"),
        vec![Branch::new((0..steps).map(|_| "step"))],
    )
    .expect("root");
    r.add_primitive(PrimitiveTask::new("step", Step)).expect("step");
    Rc::new(r)
}

/// Every level tries a branch that dead-ends after writing an effect before falling back.
fn backtracking(depth: usize) -> Rc<TaskRegistry> {
    let mut r = TaskRegistry::new();
    for level in 0..depth {
        let next = if level + 1 == depth {
            "leaf".to_string()
        } else {
            format!("level{}", level + 1)
        };
        r.add_compound(
            CompoundTask::new(format!("level{level}")),
            vec![
                Branch::new(["mark".to_string(), "blocked".to_string()]),
                Branch::new(["step".to_string(), next]),
            ],
        )
        .expect("level");
    }
    r.add_primitive(PrimitiveTask::new("mark", SetOperator::new("marked", true)))
        .expect("mark");
    r.add_primitive(PrimitiveTask::new("blocked", Step).with_precondition(KeyMissing::new("marked")))
        .expect("blocked");
    r.add_primitive(PrimitiveTask::new("step", Step)).expect("step");
    r.add_primitive(PrimitiveTask::new("leaf", Step)).expect("leaf");
    Rc::new(r)
}

fn bench_htn_planner(c: &mut Criterion) {
    let bb = Blackboard::new();

    let planner = HtnPlanner::new(wide(256));
    c.bench_function("ai-htn/planner.plan(steps=256)", |b| {
        b.iter(|| {
            let plan = planner.plan("root", &bb).expect("plan").expect("some");
            black_box(plan.len());
        })
    });

    let planner = HtnPlanner::new(backtracking(32));
    c.bench_function("ai-htn/planner.plan(backtrack depth=32)", |b| {
        b.iter(|| {
            let plan = planner.plan("level0", &bb).expect("plan").expect("some");
            black_box(plan.branch_traversal().len());
        })
    });

    let registry = backtracking(32);
    c.bench_function("ai-htn/job.run(steps=8 slices)", |b| {
        b.iter(|| {
            let mut job = HtnPlanJob::new(registry.clone(), "level0", bb.clone());
            let mut slices = 0u32;
            loop {
                let mut slice = TimeBudget::Steps(8).start();
                slices += 1;
                if let JobPoll::Ready(outcome) = job.run(&mut slice) {
                    black_box(outcome.expect("plan"));
                    break;
                }
            }
            black_box(slices);
        })
    });
}

criterion_group!(benches, bench_htn_planner);
criterion_main!(benches);
