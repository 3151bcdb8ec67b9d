//! Multichat CLI
//!
//! Terminal front-end for the multi-server chat client: argument parsing, layered
//! configuration, and a line-oriented interactive loop over a running client task.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod terminal;
