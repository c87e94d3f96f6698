//! Route definitions.

pub mod health;
