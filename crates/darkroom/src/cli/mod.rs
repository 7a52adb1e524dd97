//! Command handlers for the `darkroom` binary.

pub mod config;
pub mod run;
pub mod select;
