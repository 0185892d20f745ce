//! CLI command implementations

pub mod ports;
pub mod qoe;
