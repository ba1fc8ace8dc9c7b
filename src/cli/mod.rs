//! CLI module for stratloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
