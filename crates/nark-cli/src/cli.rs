//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nark_core::TimeHint;

/// Factoid-driven time tracker.
///
/// Records facts written as `start[ to end]: activity[@category]: #tag: description`.
#[derive(Debug, Parser)]
#[command(name = "nark", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a fact from a factoid.
    ///
    /// Example: `nark add 09:00 to 10:30: coding@work: #review: pairing`
    Add {
        /// Which endpoints the factoid must supply (e.g. both, start, end, none).
        #[arg(long, default_value = "verify_none")]
        hint: TimeHint,

        /// Trim, split or delete overlapping facts instead of failing.
        #[arg(short, long)]
        force: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// The factoid.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        factoid: Vec<String>,
    },

    /// Start an ongoing fact.
    Start {
        /// Start time (default: now). Accepts clock times, dates and offsets like -15m.
        #[arg(long, allow_hyphen_values = true)]
        at: Option<String>,

        /// `activity[@category]`, optionally followed by `: #tag` and `: description`.
        #[arg(required = true, trailing_var_arg = true)]
        activity: Vec<String>,
    },

    /// Stop the ongoing fact.
    Stop {
        /// End time (default: now).
        #[arg(long, allow_hyphen_values = true)]
        at: Option<String>,
    },

    /// Discard the ongoing fact.
    Cancel,

    /// Delete a stored fact by id.
    Remove {
        /// Fact id, as printed in brackets by other commands.
        id: i64,

        /// Drop the fact from the database instead of marking it deleted.
        #[arg(long)]
        purge: bool,
    },

    /// Show the ongoing fact.
    Current {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a factoid without saving it, reporting every problem.
    Check {
        #[arg(long, default_value = "verify_none")]
        hint: TimeHint,

        /// The factoid.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        factoid: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remove_with_purge() {
        let cli = Cli::parse_from(["nark", "remove", "3", "--purge"]);
        let Some(Commands::Remove { id, purge }) = cli.command else {
            panic!("expected remove command");
        };
        assert_eq!(id, 3);
        assert!(purge);
    }

    #[test]
    fn parses_factoid_words_after_flags() {
        let cli = Cli::parse_from([
            "nark", "add", "--hint", "both", "09:00", "to", "10:00:", "act",
        ]);
        let Some(Commands::Add { hint, factoid, .. }) = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(hint, TimeHint::VerifyBoth);
        assert_eq!(factoid.join(" "), "09:00 to 10:00: act");
    }

    #[test]
    fn relative_start_is_not_a_flag() {
        let cli = Cli::parse_from(["nark", "start", "--at", "-15m", "act"]);
        let Some(Commands::Start { at, activity }) = cli.command else {
            panic!("expected start command");
        };
        assert_eq!(at.as_deref(), Some("-15m"));
        assert_eq!(activity, vec!["act"]);
    }

    #[test]
    fn rejects_unknown_hint() {
        let result = Cli::try_parse_from(["nark", "add", "--hint", "sometimes", "act"]);
        assert!(result.is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
