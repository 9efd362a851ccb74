//! Configuration, secret vault, triage rules and run orchestration.

pub mod config;
pub mod error;
pub mod messaging;
pub mod runner;
pub mod triage;
pub mod vault;

pub use error::RunError;
pub use runner::{AlertRunner, RunReport};
