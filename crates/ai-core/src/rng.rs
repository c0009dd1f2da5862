//! Deterministic per-agent random streams.
//!
//! Seeds are derived from a global seed, the agent's stable id and a stream number, so two
//! runs with the same inputs draw the same values regardless of agent update order.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type AgentRng = ChaCha8Rng;

pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

pub fn derive_seed(global_seed: u64, agent_id: u64, stream: u64) -> u64 {
    let x = global_seed ^ mix64(agent_id.wrapping_add(0x9E3779B97F4A7C15)) ^ mix64(stream);
    mix64(x)
}

pub fn agent_rng(global_seed: u64, agent_id: u64, stream: u64) -> AgentRng {
    ChaCha8Rng::seed_from_u64(derive_seed(global_seed, agent_id, stream))
}
