//! Command implementations for the BugHunter CLI
//!
//! `run` drives the whole pipeline over an input CSV and writes the three-column
//! output file, `evaluate` scores an earlier output against the labelled input, and
//! `config` prints or checks pipeline configuration files.

pub mod config;
pub mod evaluate;
pub mod run;
