#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use ai_core::{BbKey, Blackboard};

/// A small, allocation-friendly trace event.
///
/// This is intentionally "dumb data" so it can be recorded during simulation and later rendered
/// by tooling. `a` and `b` carry event-specific payloads (plan length, branch index, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub tag: Cow<'static, str>,
    pub a: u64,
    pub b: u64,
}

impl TraceEvent {
    pub fn new(tick: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            tag: tag.into(),
            a: 0,
            b: 0,
        }
    }

    pub fn with_a(mut self, a: u64) -> Self {
        self.a = a;
        self
    }

    pub fn with_b(mut self, b: u64) -> Self {
        self.b = b;
        self
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Forwards events to `tracing` at debug level under the `ai.trace` target.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn emit(&mut self, event: TraceEvent) {
        tracing::debug!(
            target: "ai.trace",
            tick = event.tick,
            a = event.a,
            b = event.b,
            "{}",
            event.tag
        );
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.tag.as_ref())
    }
}

/// Handles are shared, so every shallow clone of a blackboard (including planner copies)
/// reports into the same log or sink.
pub type SharedTraceLog = Rc<RefCell<TraceLog>>;
pub type SharedTraceSink = Rc<RefCell<dyn TraceSink>>;

/// Blackboard key for collecting events in-memory.
pub const TRACE_LOG: BbKey<SharedTraceLog> = BbKey::new("ai.trace.log");
/// Blackboard key for streaming events into a user-provided sink.
pub const TRACE_SINK: BbKey<SharedTraceSink> = BbKey::new("ai.trace.sink");

pub fn shared_log() -> SharedTraceLog {
    Rc::new(RefCell::new(TraceLog::default()))
}

pub fn shared_sink(sink: impl TraceSink + 'static) -> SharedTraceSink {
    Rc::new(RefCell::new(sink))
}

/// Record `event` into whichever of [`TRACE_LOG`] / [`TRACE_SINK`] the blackboard carries.
///
/// Only reads the blackboard, so it is safe to call while the blackboard is read-only. Keys
/// holding a value of another type are ignored.
pub fn emit(blackboard: &Blackboard, event: TraceEvent) {
    if let Some(log) = blackboard.try_get(TRACE_LOG).ok().flatten() {
        log.borrow_mut().push(event.clone());
    }
    if let Some(sink) = blackboard.try_get(TRACE_SINK).ok().flatten() {
        sink.borrow_mut().emit(event);
    }
}
