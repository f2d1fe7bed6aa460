//! Parlay construction and local persistence.
//!
//! Library crate exposing all modules for use by integration tests
//! and the `parlay` binary.

pub mod config;
pub mod types;
pub mod slip;
pub mod analysis;
pub mod engine;
pub mod storage;
