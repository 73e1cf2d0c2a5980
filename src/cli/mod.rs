//! CLI module for OnboardBuddy
//!
//! Handles command-line argument parsing and logging setup.

pub mod args;

pub use args::{Args, Commands, SessionCommand, Verbosity};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub fn init_tracing(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
