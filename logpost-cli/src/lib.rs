//! Logpost CLI library surface.
//!
//! The binary in `main.rs` is a thin dispatcher; this crate root exposes
//! the argument parser, command handlers, and output machinery so
//! integration tests can drive them directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
