#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared models, configuration, and the LLM client layer for CareAdvisor.

pub mod config;
pub mod llms;
pub mod models;
