//! Command-line front end for Cortex slash commands.
//!
//! Loads `slash-commands.toml`, discovers project and user commands, and
//! renders one invocation: the prompt goes to stdout, warnings to stderr.

pub mod cli;
