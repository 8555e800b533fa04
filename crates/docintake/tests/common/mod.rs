//! Shared test utilities for docintake integration tests.
//!
//! - `TestHarness` wires an `IntakePipeline` to scripted collaborators
//! - builders for policies, candidates and config files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
