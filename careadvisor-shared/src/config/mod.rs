//! # Configuration
//!
//! Configuration structures and loading logic for the CareAdvisor server.

pub mod server;

pub use server::{Config, LimitsConfig, LlmConfig, LogFormat, LoggingConfig};
