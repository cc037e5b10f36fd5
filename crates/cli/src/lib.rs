//! Control daemon and command-line client for the Blynx browser shell.

pub mod cli;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod logging;
