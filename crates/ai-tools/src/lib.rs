//! Tooling primitives for deterministic game AI.
//!
//! This crate is intentionally lightweight and engine-agnostic. Higher-level integrations
//! (inspectors, network debug channels, etc.) should live in dedicated adapter crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{
    emit, shared_log, shared_sink, NullTraceSink, SharedTraceLog, SharedTraceSink, TraceEvent,
    TraceLog, TraceSink, TracingSink, VecTraceSink, TRACE_LOG, TRACE_SINK,
};
