//! Operator lifecycle for the current step of a [`Plan`].

use ai_core::Blackboard;

use crate::operator::{OperatorStatus, ShutdownCondition};
use crate::plan::{Plan, PlanStep};
use crate::task::PrimitiveTask;

fn start_primitive(primitive: &PrimitiveTask, blackboard: &mut Blackboard) {
    primitive.operator.startup(blackboard);
}

impl Plan {
    /// Primitives of the current step that are running right now.
    pub fn active_primitives(&self) -> &[std::rc::Rc<PrimitiveTask>] {
        match self.current_step() {
            None => &[],
            Some(PlanStep::Repeating { members, .. }) => {
                let i = self.member.min(members.len().saturating_sub(1));
                &members[i..(i + 1).min(members.len())]
            }
            Some(step) => step.primitives(),
        }
    }

    /// Start the current step, first writing its planning effects to `blackboard` when its
    /// primitives ask for it.
    pub fn start_current(&mut self, blackboard: &mut Blackboard) {
        let Some(step) = self.current_step() else {
            return;
        };

        let apply = step.primitives().iter().all(|p| p.apply_effects_on_startup);
        if apply {
            if let Some(effects) = self.current_effects() {
                if let Err(err) = blackboard.apply(effects) {
                    tracing::warn!(step = %step.id(), %err, "could not apply planning effects");
                }
            }
        }

        self.member = 0;
        for primitive in self.active_primitives() {
            start_primitive(primitive, blackboard);
        }
    }

    /// Update the current step once.
    ///
    /// Parallel steps report the first member that stops continuing. Repeating steps move on to
    /// the next member (wrapping around) when one finishes and only ever report `Continuing`
    /// or `Failed`.
    pub fn update_current(&mut self, blackboard: &mut Blackboard, dt: f32) -> OperatorStatus {
        let member = self.member;
        let Some(step) = self.current_step() else {
            return OperatorStatus::Failed;
        };

        match step {
            PlanStep::Primitive(primitive) => primitive.operator.update(blackboard, dt),
            PlanStep::Parallel { members, .. } => {
                for primitive in members {
                    let status = primitive.operator.update(blackboard, dt);
                    if status != OperatorStatus::Continuing {
                        return status;
                    }
                }
                OperatorStatus::Continuing
            }
            PlanStep::Repeating { members, .. } => {
                let Some(primitive) = members.get(member) else {
                    return OperatorStatus::Failed;
                };
                let primitive = primitive.clone();
                let len = members.len();
                match primitive.operator.update(blackboard, dt) {
                    OperatorStatus::Finished => {
                        primitive.operator.shutdown(blackboard, OperatorStatus::Finished);
                        task_finished(&primitive, blackboard);
                        self.member = (member + 1) % len;
                        if let Some(PlanStep::Repeating { members, .. }) = self.current_step() {
                            start_primitive(&members[self.member], blackboard);
                        }
                        OperatorStatus::Continuing
                    }
                    status => status,
                }
            }
        }
    }

    /// Shut down whatever the current step is running.
    pub fn shutdown_current(&self, blackboard: &mut Blackboard, status: OperatorStatus) {
        for primitive in self.active_primitives() {
            primitive.operator.shutdown(blackboard, status);
            if status == OperatorStatus::Finished {
                task_finished(primitive, blackboard);
            }
        }
    }

    /// Plan-level cleanup for every operator that asked for it.
    pub fn shutdown_plan(&self, blackboard: &mut Blackboard) {
        for step in self.steps() {
            for primitive in step.primitives() {
                if primitive.operator.shutdown_condition() == Some(ShutdownCondition::PlanFinished) {
                    primitive.operator.conditional_shutdown(blackboard);
                }
            }
        }
    }
}

fn task_finished(primitive: &PrimitiveTask, blackboard: &mut Blackboard) {
    if primitive.operator.shutdown_condition() == Some(ShutdownCondition::TaskFinished) {
        primitive.operator.conditional_shutdown(blackboard);
    }
}
