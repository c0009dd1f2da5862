use ai_core::{AgentId, RoundRobin, TickContext};
use rand::Rng;

#[test]
fn round_robin_resumes_after_last_visited() {
    let mut rr = RoundRobin::<u64>::new();
    assert_eq!(rr.order([3, 1, 2]), vec![1, 2, 3]);

    rr.visit(2);
    assert_eq!(rr.order([1, 2, 3, 4]), vec![3, 4, 1, 2]);

    // The last visited agent may have been removed since.
    rr.visit(5);
    assert_eq!(rr.order([1, 7, 9]), vec![7, 9, 1]);
}

#[test]
fn agent_rng_is_deterministic_per_agent_and_stream() {
    let ctx = TickContext::new(0.1, 42);
    let mut a = ctx.rng_for_agent(7u64, 1);
    let mut b = ctx.rng_for_agent(7u64, 1);
    let mut c = ctx.rng_for_agent(8u64, 1);

    let xa: u64 = a.gen();
    let xb: u64 = b.gen();
    let xc: u64 = c.gen();
    assert_eq!(xa, xb);
    assert_ne!(xa, xc);
    assert_eq!(7u32.stable_id(), 7);
    assert_eq!(ctx.next().tick, 1);
}
