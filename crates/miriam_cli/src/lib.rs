//! Operator commands over the registry core.

pub mod commands;
pub mod config;
