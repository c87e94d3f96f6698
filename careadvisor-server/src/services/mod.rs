//! Domain services behind the request pipeline.

pub mod rate_limit;
