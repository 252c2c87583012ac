//! Command-line interface module.
//!
//! - Argument parsing via clap
//! - Output formatting (ofdump-style text, table, CSV, JSON)

mod args;
mod output;

pub use args::Args;
pub use output::{write_backlog, OutputFormat, OutputFormatter};
