use core::fmt::Debug;

/// Stable identifier for an agent.
///
/// Deterministic simulation requires:
/// - stable ordering (`Ord`)
/// - a stable numeric ID (`stable_id`) for seeding and logs
pub trait AgentId: Copy + Ord + Eq + Debug {
    fn stable_id(self) -> u64;
}

impl AgentId for u64 {
    fn stable_id(self) -> u64 {
        self
    }
}

impl AgentId for u32 {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

impl AgentId for usize {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

/// Fair visiting order over a set of agents.
///
/// Each pass starts right after the last agent visited in the previous pass, so a per-tick cap
/// on updates rotates through the whole population instead of always serving the lowest ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin<A> {
    last: Option<A>,
}

impl<A> Default for RoundRobin<A> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<A: AgentId> RoundRobin<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<A> {
        self.last
    }

    pub fn visit(&mut self, agent: A) {
        self.last = Some(agent);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// `agents` sorted and rotated to begin after the last visited agent.
    pub fn order(&self, agents: impl IntoIterator<Item = A>) -> Vec<A> {
        let mut sorted: Vec<A> = agents.into_iter().collect();
        sorted.sort();
        sorted.dedup();
        if let Some(last) = self.last {
            let split = sorted.partition_point(|a| *a <= last);
            sorted.rotate_left(split);
        }
        sorted
    }
}
