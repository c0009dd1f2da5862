//! Text dumps of task networks and plans for debug channels and the CLI.

use std::fmt::Write;

use crate::plan::Plan;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskId};

/// The task tree under `root`, one task per line, nested by indentation.
///
/// A compound task that reappears inside its own subtree is printed once more with a
/// `(recursive)` marker and not expanded again.
pub fn describe_domain(registry: &TaskRegistry, root: &TaskId) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    append_domain(registry, root, 0, &mut path, &mut out);
    out
}

fn append_domain(
    registry: &TaskRegistry,
    id: &TaskId,
    indent: usize,
    path: &mut Vec<TaskId>,
    out: &mut String,
) {
    let pad = "    ".repeat(indent);
    let Some(task) = registry.resolve(id) else {
        let _ = writeln!(out, "{pad}Missing: {id}");
        return;
    };

    match task {
        Task::Primitive(primitive) => {
            let _ = writeln!(out, "{pad}Primitive: {id}");
            let _ = writeln!(out, "{pad}  operator: {}", primitive.operator.name());
        }
        Task::Parallel(parallel) => {
            let _ = writeln!(out, "{pad}Parallel: {id}");
            for member in &parallel.tasks {
                append_domain(registry, member, indent + 1, path, out);
            }
        }
        Task::Repeating(repeating) => {
            let _ = writeln!(out, "{pad}Repeating: {id}");
            for member in &repeating.tasks {
                append_domain(registry, member, indent + 1, path, out);
            }
        }
        Task::Compound(_) => {
            if path.contains(id) {
                let _ = writeln!(out, "{pad}Compound: {id} (recursive)");
                return;
            }
            let _ = writeln!(out, "{pad}Compound: {id}");
            path.push(id.clone());
            for branch in registry.branches(id).iter().flat_map(|b| b.iter()) {
                let _ = writeln!(out, "{pad}  branch:");
                for sub in &branch.tasks {
                    append_domain(registry, sub, indent + 1, path, out);
                }
            }
            path.pop();
        }
    }
}

/// Plan summary followed by the branch tree under `root`.
///
/// ```text
/// BTR: 1
/// steps: wander
/// current: 0/1 wander
/// tasks:
///  root
///  branch 0:
/// -- attack
///  branch 1:
/// -- wander
/// ```
pub fn describe_plan(registry: &TaskRegistry, root: &TaskId, plan: &Plan) -> String {
    let mut out = String::new();
    let btr: Vec<String> = plan.branch_traversal().iter().map(usize::to_string).collect();
    let _ = writeln!(out, "BTR: {}", btr.join(", "));
    let _ = writeln!(out, "steps: {}", plan.task_ids().join(", "));
    if let Some(step) = plan.current_step() {
        let _ = writeln!(out, "current: {}/{} {}", plan.index(), plan.len(), step.id());
    }
    let _ = writeln!(out, "tasks:");
    let mut btr = Vec::new();
    let mut path = Vec::new();
    append_tree(registry, root, &mut btr, &mut path, &mut out);
    out
}

fn append_tree(
    registry: &TaskRegistry,
    id: &TaskId,
    btr: &mut Vec<usize>,
    path: &mut Vec<TaskId>,
    out: &mut String,
) {
    out.push_str(&"--".repeat(btr.len()));
    out.push(' ');
    let _ = writeln!(out, "{id}");

    let Some(Task::Compound(_)) = registry.resolve(id) else {
        return;
    };
    if path.contains(id) {
        return;
    }

    path.push(id.clone());
    let branches = registry.branches(id);
    for (i, branch) in branches.iter().flat_map(|b| b.iter()).enumerate() {
        btr.push(i);
        let labels: Vec<String> = btr.iter().map(usize::to_string).collect();
        let _ = writeln!(out, " branch {}:", labels.join(", "));
        for sub in &branch.tasks {
            append_tree(registry, sub, btr, path, out);
        }
        btr.pop();
    }
    path.pop();
}
