//! Command-line argument parsing for OnboardBuddy
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// OnboardBuddy - conversation memory for the onboarding assistant
#[derive(Parser, Debug)]
#[command(name = "onboardbuddy")]
#[command(version)]
#[command(about = "Inspect sessions and token budgets of the onboarding assistant", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only warnings and errors are logged)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count tokens in a piece of text
    Count {
        /// Text to tokenize
        text: String,
    },

    /// Compress a JSON array of messages to a token budget
    Compress {
        /// File holding `[{"role": ..., "content": ...}, ...]`
        file: PathBuf,

        /// Token budget (configured default if omitted)
        #[arg(short, long, allow_negative_numbers = true)]
        budget: Option<i64>,

        /// Print compression statistics instead of the messages
        #[arg(long)]
        stats: bool,
    },

    /// Manage conversation sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Display current configuration
    Config,
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Create a session and print its id
    New {
        /// Owning user
        #[arg(long)]
        user: Option<String>,
    },

    /// List sessions, optionally for one user
    List {
        #[arg(long)]
        user: Option<String>,
    },

    /// Show a session record
    Show { id: String },

    /// Print stored history
    History {
        id: String,

        /// Only the newest N messages
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Append a message
    Say {
        id: String,

        /// user, assistant or system
        #[arg(short, long, default_value = "user")]
        role: String,

        content: String,
    },

    /// Print the compressed context for the next turn
    Context {
        id: String,

        #[arg(short, long, allow_negative_numbers = true)]
        budget: Option<i64>,
    },

    /// Drop a session's history
    Clear { id: String },

    /// Delete a session and its history
    Delete { id: String },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default tracing filter for this level
    pub fn filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        let args = Args::try_parse_from(["onboardbuddy", "count", "hello world"]).unwrap();
        assert!(matches!(args.command, Commands::Count { ref text } if text == "hello world"));
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_parse_compress_negative_budget() {
        let args = Args::try_parse_from(["onboardbuddy", "compress", "history.json", "--budget", "-5"]).unwrap();
        match args.command {
            Commands::Compress { budget, stats, .. } => {
                assert_eq!(budget, Some(-5));
                assert!(!stats);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_session_say() {
        let args = Args::try_parse_from([
            "onboardbuddy", "-vv", "session", "say", "abc", "--role", "assistant", "Welcome!",
        ])
        .unwrap();

        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
        match args.command {
            Commands::Session(SessionCommand::Say { id, role, content }) => {
                assert_eq!(id, "abc");
                assert_eq!(role, "assistant");
                assert_eq!(content, "Welcome!");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_quiet_wins() {
        let args = Args::try_parse_from(["onboardbuddy", "-q", "-v", "config"]).unwrap();
        assert_eq!(args.verbosity(), Verbosity::Quiet);
        assert_eq!(args.verbosity().filter(), "warn");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["onboardbuddy"]).is_err());
    }
}
