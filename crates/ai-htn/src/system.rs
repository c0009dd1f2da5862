//! Per-agent planning and plan execution.
//!
//! [`HtnSystem`] owns the shared [`TaskRegistry`], one [`JobQueue`] of planning jobs and the
//! state of every agent. Each call to [`HtnSystem::update`] gives the queued searches their
//! slices, then advances a capped number of agents in round-robin order.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::rc::Rc;

use ai_core::{rng, AgentId, AgentRng, Blackboard, JobId, JobQueue, JobStatus, RoundRobin, TickContext};
use ai_tools::{emit, TraceEvent};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::{AgentConfig, HtnConfig};
use crate::debug::{describe_domain, describe_plan};
use crate::operator::OperatorStatus;
use crate::plan::Plan;
use crate::planner::{HtnPlanJob, PlanError};
use crate::registry::TaskRegistry;
use crate::task::TaskId;

const SERVICE_STREAM: u64 = 0x5e41;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No plan and no search in flight; counting down to the next request.
    Idle,
    /// A search is in flight and there is no plan to execute meanwhile.
    Planning,
    Executing,
    /// A search failed fatally. Nothing runs until [`HtnSystem::reset_agent`].
    Disabled,
}

/// Text pushed to debug subscribers whenever an agent adopts a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage<A> {
    pub agent: A,
    pub tick: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport<A> {
    /// Agents advanced this tick.
    pub updated: usize,
    /// Planner slices run this tick.
    pub slices: usize,
    /// Agents disabled this tick by a fatal planning error.
    pub faults: Vec<(A, PlanError)>,
}

impl<A> Default for UpdateReport<A> {
    fn default() -> Self {
        Self {
            updated: 0,
            slices: 0,
            faults: Vec::new(),
        }
    }
}

/// Planning and execution state of one agent.
pub struct HtnAgent {
    blackboard: Blackboard,
    config: AgentConfig,
    plan: Option<Plan>,
    job: Option<JobId>,
    cancel: Option<CancellationToken>,
    accumulator: f32,
    force_replan: bool,
    service_cooldowns: BTreeMap<Cow<'static, str>, f32>,
    refresh_services: bool,
    rng: AgentRng,
    fault: Option<PlanError>,
    debug: bool,
}

impl HtnAgent {
    fn new(config: AgentConfig, blackboard: Blackboard, rng: AgentRng) -> Self {
        Self {
            blackboard,
            config,
            plan: None,
            job: None,
            cancel: None,
            accumulator: 0.0,
            force_replan: false,
            service_cooldowns: BTreeMap::new(),
            refresh_services: false,
            rng,
            fault: None,
            debug: false,
        }
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn branch_traversal(&self) -> Option<&[usize]> {
        self.plan.as_ref().map(Plan::branch_traversal)
    }

    /// The error that disabled this agent.
    pub fn fault(&self) -> Option<&PlanError> {
        self.fault.as_ref()
    }

    /// Seconds left before the next plan request.
    pub fn plan_accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn state(&self) -> AgentState {
        if self.fault.is_some() {
            AgentState::Disabled
        } else if self.plan.is_some() {
            AgentState::Executing
        } else if self.job.is_some() {
            AgentState::Planning
        } else {
            AgentState::Idle
        }
    }

    fn cancel_job(&mut self, queue: &mut JobQueue<HtnPlanJob>) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(job) = self.job.take() {
            queue.remove(job);
        }
    }

    /// Shut down the current step with `status`, then run plan-level cleanup.
    fn teardown(&mut self, status: OperatorStatus) {
        if let Some(plan) = self.plan.take() {
            plan.shutdown_current(&mut self.blackboard, status);
            plan.shutdown_plan(&mut self.blackboard);
        }
        self.service_cooldowns.clear();
        self.refresh_services = false;
    }
}

pub struct HtnSystem<A: AgentId> {
    registry: Rc<TaskRegistry>,
    config: HtnConfig,
    queue: JobQueue<HtnPlanJob>,
    agents: BTreeMap<A, HtnAgent>,
    cursor: RoundRobin<A>,
    debug: Vec<DebugMessage<A>>,
}

impl<A: AgentId> HtnSystem<A> {
    pub fn new(registry: Rc<TaskRegistry>, config: HtnConfig) -> Self {
        Self {
            queue: JobQueue::new(config.queue_budget),
            registry,
            config,
            agents: BTreeMap::new(),
            cursor: RoundRobin::new(),
            debug: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Rc<TaskRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HtnConfig {
        &self.config
    }

    /// Planning jobs currently held by the queue.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Add an agent planning `root` with the system defaults and an empty blackboard.
    /// Replaces (and shuts down) any agent registered under the same id.
    pub fn add_agent(&mut self, agent: A, root: impl Into<TaskId>) {
        let config = self.config.agent(root);
        self.add_agent_with(agent, config, Blackboard::new());
    }

    pub fn add_agent_with(&mut self, agent: A, config: AgentConfig, blackboard: Blackboard) {
        self.remove_agent(agent);
        let rng = rng::agent_rng(self.config.seed, agent.stable_id(), SERVICE_STREAM);
        self.agents.insert(agent, HtnAgent::new(config, blackboard, rng));
    }

    /// Remove an agent, cancelling its search and shutting down its plan.
    /// Returns its blackboard.
    pub fn remove_agent(&mut self, agent: A) -> Option<Blackboard> {
        let mut state = self.agents.remove(&agent)?;
        state.cancel_job(&mut self.queue);
        state.teardown(OperatorStatus::Failed);
        Some(state.blackboard)
    }

    pub fn agent(&self, agent: A) -> Option<&HtnAgent> {
        self.agents.get(&agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = (A, &HtnAgent)> {
        self.agents.iter().map(|(id, state)| (*id, state))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The live blackboard of `agent`. Searches already in flight keep their own copy.
    pub fn blackboard_mut(&mut self, agent: A) -> Option<&mut Blackboard> {
        self.agents.get_mut(&agent).map(|state| &mut state.blackboard)
    }

    pub fn state(&self, agent: A) -> Option<AgentState> {
        self.agents.get(&agent).map(HtnAgent::state)
    }

    /// Request a new plan on the agent's next update, even while one is executing.
    pub fn replan(&mut self, agent: A) -> bool {
        let Some(state) = self.agents.get_mut(&agent) else {
            return false;
        };
        state.accumulator = 0.0;
        state.force_replan = true;
        true
    }

    /// Clear a fatal planning error and let the agent plan again.
    pub fn reset_agent(&mut self, agent: A) -> bool {
        let Some(state) = self.agents.get_mut(&agent) else {
            return false;
        };
        state.cancel_job(&mut self.queue);
        state.fault = None;
        state.accumulator = 0.0;
        true
    }

    pub fn subscribe_debug(&mut self, agent: A, enabled: bool) -> bool {
        let Some(state) = self.agents.get_mut(&agent) else {
            return false;
        };
        state.debug = enabled;
        true
    }

    pub fn drain_debug(&mut self) -> Vec<DebugMessage<A>> {
        std::mem::take(&mut self.debug)
    }

    /// The agent's plan tree with its branch-traversal record, or its domain when it has no
    /// plan.
    pub fn describe(&self, agent: A) -> Option<String> {
        let state = self.agents.get(&agent)?;
        Some(match &state.plan {
            Some(plan) => describe_plan(&self.registry, &state.config.root, plan),
            None => describe_domain(&self.registry, &state.config.root),
        })
    }

    /// Swap the task network. Every search is cancelled, every plan is shut down with
    /// [`OperatorStatus::Failed`] and every agent replans on its next update.
    pub fn reload(&mut self, registry: Rc<TaskRegistry>) {
        for (id, state) in self.agents.iter_mut() {
            state.cancel_job(&mut self.queue);
            if state.plan.is_some() {
                tracing::debug!(agent = ?id, "dropping plan for registry reload");
            }
            state.teardown(OperatorStatus::Failed);
            state.accumulator = 0.0;
        }
        self.registry = registry;
    }

    /// Run one scheduler tick.
    pub fn update(&mut self, ctx: &TickContext) -> UpdateReport<A> {
        let mut report = UpdateReport {
            slices: self.queue.process(),
            ..UpdateReport::default()
        };

        let order = self.cursor.order(self.agents.keys().copied());
        for id in order {
            if report.updated >= self.config.max_updates_per_tick {
                break;
            }
            let Some(state) = self.agents.get_mut(&id) else {
                continue;
            };
            if state.fault.is_some() {
                continue;
            }

            self.cursor.visit(id);
            report.updated += 1;

            if let Some(err) = Self::poll_job(
                id,
                state,
                &mut self.queue,
                &self.registry,
                &mut self.debug,
                ctx.tick,
            ) {
                report.faults.push((id, err));
                continue;
            }

            Self::request_plan(id, state, &mut self.queue, &self.registry, &self.config, ctx);
            Self::execute(id, state, ctx);
        }

        report
    }

    /// Handle a finished search. Returns the error when it disabled the agent.
    fn poll_job(
        id: A,
        state: &mut HtnAgent,
        queue: &mut JobQueue<HtnPlanJob>,
        registry: &TaskRegistry,
        debug: &mut Vec<DebugMessage<A>>,
        tick: u64,
    ) -> Option<PlanError> {
        let job = state.job?;
        if queue.status(job) != Some(JobStatus::Finished) {
            return None;
        }
        let outcome = queue.take(job)?;
        state.job = None;
        state.cancel = None;

        let new_plan = match outcome {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!(agent = ?id, %err, "planning failed fatally, disabling agent");
                emit(&state.blackboard, TraceEvent::new(tick, "htn.plan.fatal"));
                state.teardown(OperatorStatus::Failed);
                state.fault = Some(err.clone());
                return Some(err);
            }
        };

        let Some(mut new_plan) = new_plan else {
            tracing::trace!(agent = ?id, "no plan found");
            emit(&state.blackboard, TraceEvent::new(tick, "htn.plan.none"));
            return None;
        };

        let adopt = match &state.plan {
            None => true,
            Some(current) => new_plan.is_better_than(current),
        };

        if !adopt {
            tracing::trace!(agent = ?id, btr = ?new_plan.branch_traversal(), "keeping current plan");
            emit(&state.blackboard, TraceEvent::new(tick, "htn.plan.keep"));
            state.refresh_services = true;
            return None;
        }

        state.teardown(OperatorStatus::BetterPlan);
        tracing::debug!(
            agent = ?id,
            steps = ?new_plan.task_ids(),
            btr = ?new_plan.branch_traversal(),
            "adopting plan"
        );
        emit(
            &state.blackboard,
            TraceEvent::new(tick, "htn.plan.adopt")
                .with_a(new_plan.len() as u64)
                .with_b(new_plan.branch_traversal().first().copied().unwrap_or(0) as u64),
        );
        if state.debug {
            debug.push(DebugMessage {
                agent: id,
                tick,
                text: describe_plan(registry, &state.config.root, &new_plan),
            });
        }
        new_plan.start_current(&mut state.blackboard);
        state.plan = Some(new_plan);
        None
    }

    fn request_plan(
        id: A,
        state: &mut HtnAgent,
        queue: &mut JobQueue<HtnPlanJob>,
        registry: &Rc<TaskRegistry>,
        config: &HtnConfig,
        ctx: &TickContext,
    ) {
        if state.job.is_some() {
            return;
        }
        state.accumulator -= ctx.dt_seconds;
        if state.accumulator > 0.0 {
            return;
        }
        if state.plan.is_some() && !state.config.continuous_replan && !state.force_replan {
            return;
        }

        state.force_replan = false;
        state.accumulator = state.accumulator.max(0.0) + state.config.plan_cooldown;

        let cancel = CancellationToken::new();
        let job = HtnPlanJob::new(registry.clone(), &state.config.root, state.blackboard.clone())
            .with_bias(state.plan.as_ref().map(|plan| plan.branch_traversal().to_vec()))
            .with_cancel(cancel.clone())
            .with_max_tasks(state.config.max_tasks);
        state.job = Some(queue.enqueue(job, config.job_budget));
        state.cancel = Some(cancel);

        tracing::trace!(agent = ?id, root = %state.config.root, "plan requested");
        emit(&state.blackboard, TraceEvent::new(ctx.tick, "htn.plan.request"));
    }

    /// Update the current step, chaining into following steps while they finish at once.
    fn execute(id: A, state: &mut HtnAgent, ctx: &TickContext) {
        let mut elapsed = ctx.dt_seconds;
        loop {
            let Some(plan) = state.plan.as_mut() else {
                return;
            };

            run_services(
                plan,
                &mut state.blackboard,
                &mut state.service_cooldowns,
                &mut state.rng,
                std::mem::take(&mut state.refresh_services),
                elapsed,
            );
            elapsed = 0.0;

            match plan.update_current(&mut state.blackboard, ctx.dt_seconds) {
                OperatorStatus::Continuing => return,
                OperatorStatus::Finished => {
                    plan.shutdown_current(&mut state.blackboard, OperatorStatus::Finished);
                    if plan.advance() {
                        plan.start_current(&mut state.blackboard);
                        continue;
                    }
                    tracing::debug!(agent = ?id, "plan finished");
                    emit(&state.blackboard, TraceEvent::new(ctx.tick, "htn.plan.finished"));
                    if let Some(plan) = state.plan.take() {
                        plan.shutdown_plan(&mut state.blackboard);
                    }
                    state.service_cooldowns.clear();
                    return;
                }
                status => {
                    tracing::debug!(agent = ?id, step = plan.index(), ?status, "plan failed");
                    emit(
                        &state.blackboard,
                        TraceEvent::new(ctx.tick, "htn.plan.failed").with_a(plan.index() as u64),
                    );
                    state.teardown(status);
                    return;
                }
            }
        }
    }
}

/// Run the services of the current step that are off cooldown, or all of them on `refresh`.
fn run_services(
    plan: &Plan,
    blackboard: &mut Blackboard,
    cooldowns: &mut BTreeMap<Cow<'static, str>, f32>,
    rng: &mut AgentRng,
    refresh: bool,
    dt: f32,
) {
    for primitive in plan.active_primitives() {
        for binding in &primitive.services {
            let remaining = cooldowns.get(&binding.id).copied().unwrap_or(0.0) - dt;
            if remaining > 0.0 && !refresh {
                cooldowns.insert(binding.id.clone(), remaining);
                continue;
            }

            let result = match binding.service.query(blackboard) {
                Some(value) => blackboard.set_value(binding.key.clone(), value),
                None => blackboard.remove_value(&binding.key).map(|_| ()),
            };
            if let Err(err) = result {
                tracing::warn!(service = %binding.id, %err, "service result not stored");
            }

            let cooldown = if binding.max_cooldown > binding.min_cooldown {
                rng.gen_range(binding.min_cooldown..=binding.max_cooldown)
            } else {
                binding.min_cooldown
            };
            cooldowns.insert(binding.id.clone(), cooldown);
        }
    }
}
