//! HTTP surface types shared by handlers.

pub mod error;
