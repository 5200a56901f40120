//! Shared test utilities for ai-content integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a file-backed job database
//! - Builders for requests and pipeline inputs
//! - Fake merge and upload services

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
