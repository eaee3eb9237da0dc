//! release-pilot: release-automation core.
//!
//! Infers a semantic version bump from commit history and diff statistics,
//! builds every configured platform concurrently, runs test suites behind a
//! coverage gate, deploys environment by environment with health-checked
//! automatic rollback, and records the whole run in a rotating audit log.

pub mod analyzer;
pub mod build;
pub mod config;
pub mod deploy;
pub mod domain;
pub mod engine;
pub mod error;
pub mod handler;
pub mod logger;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod scm;
pub mod testing;

pub use error::{ReleaseError, Result};
