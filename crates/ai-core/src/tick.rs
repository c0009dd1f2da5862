use crate::{rng, AgentId, AgentRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    pub seed: u64,
}

impl TickContext {
    pub fn new(dt_seconds: f32, seed: u64) -> Self {
        Self {
            tick: 0,
            dt_seconds,
            seed,
        }
    }

    /// The context for the following tick.
    pub fn next(self) -> Self {
        Self {
            tick: self.tick.wrapping_add(1),
            ..self
        }
    }

    pub fn rng_for_agent<A: AgentId>(&self, agent: A, stream: u64) -> AgentRng {
        rng::agent_rng(self.seed, agent.stable_id(), stream)
    }
}
