//! Integration test suite for lineage.
//!
//! These tests drive the scheduler end to end with in-memory stores and
//! closure-backed operations.
//!
//! # Test Categories
//!
//! - `dispatch`: synchronous vs asynchronous dispatch and waiting
//! - `provenance_chain`: lazy events, informer links, persistence
//! - `failures`: failed bodies, unknown operations, illegal transitions
//! - `builtins`: the operations shipped with the binary


mod builtins;
mod dispatch;
mod failures;
