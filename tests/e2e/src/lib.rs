//! Shared infrastructure for Waymark end-to-end tests.

pub mod harness;
pub mod mocks;
