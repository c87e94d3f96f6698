//! Session-based identity resolution.

pub mod session;
