use std::io::IsTerminal;

use clap::{ArgAction, Args, Parser, ValueEnum};
use strum::Display;
use tracing::Level;

use crate::cli::commands::report::ReportArgs;

#[deny(missing_docs)]
#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"))]
/// iam-role-report - Enumerate IAM roles and their policies across AWS profiles into a dated CSV report
pub struct CommandLineArgs {
    /// Options for the report run
    #[command(flatten)]
    pub report_args: ReportArgs,

    /// Global arguments
    #[command(flatten)]
    pub global_args: GlobalArgs,
}
impl CommandLineArgs {
    /// Parse command-line arguments.
    ///
    /// Maps `--quiet` into disabling progress spinners.
    pub fn parse_args() -> Self {
        let mut args = CommandLineArgs::parse();

        if args.global_args.quiet {
            args.global_args.progress = Mode::Never;
        }

        let title = args.report_args.title.trim();
        if title.is_empty() {
            args.report_args.title = crate::workflow::DEFAULT_TITLE.to_string();
        } else if title.len() != args.report_args.title.len() {
            args.report_args.title = title.to_string();
        }

        args
    }
}

/// Top-level global CLI arguments
#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output (up to 3 times for more detail)
    #[arg(global = true, long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error messages and disable progress spinners
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Show progress spinners
    #[arg(global = true, long, value_enum, default_value_t = Mode::Auto)]
    pub progress: Mode,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self { verbose: 0, quiet: false, progress: Mode::Auto }
    }
}

impl GlobalArgs {
    pub fn use_progress(&self) -> bool {
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => std::io::stderr().is_terminal(),
        }
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::INFO,  // Default level if no `-v` is provided
                1 => Level::DEBUG, // `-v`
                _ => Level::TRACE, // `-vv` or more
            }
        }
    }
}

/// Generic mode with `auto/never/always`.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Default)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    #[default]
    Auto,
    Never,
    Always,
}
