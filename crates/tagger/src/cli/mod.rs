//! Command handlers for the three invocation modes.

pub mod config;
pub mod download;
pub mod serve;
