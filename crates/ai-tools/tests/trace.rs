use std::cell::RefCell;
use std::rc::Rc;

use ai_core::Blackboard;
use ai_tools::{
    emit, shared_log, shared_sink, TraceEvent, TraceSink, TRACE_LOG, TRACE_SINK,
};

#[derive(Clone, Default)]
struct RcSink(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for RcSink {
    fn emit(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

#[test]
fn emit_writes_to_trace_log_when_present() {
    let mut bb = Blackboard::new();
    let log = shared_log();
    bb.set(TRACE_LOG, log.clone()).unwrap();

    emit(&bb, TraceEvent::new(1, "test").with_a(10).with_b(20));

    let log = log.borrow();
    assert_eq!(log.events.len(), 1);
    assert_eq!(log.events[0].tick, 1);
    assert_eq!(log.events[0].tag, "test");
    assert_eq!(log.events[0].a, 10);
    assert_eq!(log.events[0].b, 20);
}

#[test]
fn emit_writes_to_sink_when_present() {
    let mut bb = Blackboard::new();
    let handle = RcSink::default();
    let shared = handle.0.clone();
    bb.set(TRACE_SINK, shared_sink(handle)).unwrap();

    emit(&bb, TraceEvent::new(2, "sink_event"));

    let events = shared.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tick, 2);
    assert_eq!(events[0].tag, "sink_event");
}

#[test]
fn emit_reaches_shared_log_through_clones_and_read_only_mode() {
    let mut bb = Blackboard::new();
    let log = shared_log();
    bb.set(TRACE_LOG, log.clone()).unwrap();

    let mut planning_copy = bb.clone();
    planning_copy.set_read_only(true);
    emit(&planning_copy, TraceEvent::new(3, "from_copy"));
    emit(&bb, TraceEvent::new(4, "from_original"));

    let tags: Vec<String> = log.borrow().tags().map(str::to_string).collect();
    assert_eq!(tags, vec!["from_copy", "from_original"]);
}

#[test]
fn emit_without_log_or_sink_is_a_noop() {
    let bb = Blackboard::new();
    emit(&bb, TraceEvent::new(5, "nobody_listens"));
    assert!(bb.is_empty());
}

#[test]
fn emit_ignores_trace_keys_of_another_type() {
    let mut bb = Blackboard::new();
    bb.set_value(TRACE_LOG.name(), Rc::new(true)).unwrap();
    bb.set_value(TRACE_SINK.name(), Rc::new(String::from("sink"))).unwrap();

    emit(&bb, TraceEvent::new(6, "htn.plan.request"));

    assert_eq!(bb.get_value(TRACE_LOG.name()).unwrap().downcast_ref::<bool>(), Some(&true));
    assert_eq!(bb.len(), 2);
}
