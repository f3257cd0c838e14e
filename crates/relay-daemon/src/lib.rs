//! Event relay daemon library.
//!
//! CLI parsing and mode handlers live here so they can be exercised in
//! tests; `main.rs` is a thin dispatcher.

mod cli;
mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    build_pipeline, init_tracing, print_config, run_cleanup_tokens, run_continuous, run_full_sync,
    run_health_check, run_single,
};
