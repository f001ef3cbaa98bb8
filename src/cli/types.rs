use clap::{Parser, ValueEnum};

use crate::adapters::providers::SUPPORTED_PROVIDERS;
use crate::domain::models::ResumeMode;

#[derive(Parser, Debug)]
#[command(name = "sherlockbench")]
#[command(about = "Run SherlockBench against an LLM provider", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Model provider to benchmark
    #[arg(value_parser = clap::builder::PossibleValuesParser::new(SUPPORTED_PROVIDERS))]
    pub provider: String,

    /// The id of an existing run, or the id of a problem-set. Use 'list' to see available problem sets.
    pub arg: Option<String>,

    /// Number of attempts per problem
    #[arg(long)]
    pub attempts_per_problem: Option<u32>,

    /// How to handle resuming from a failed run: 'skip' the failed attempt, or 'retry' it
    #[arg(long, value_enum)]
    pub resume: Option<ResumeArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeArg {
    Skip,
    Retry,
}

impl From<ResumeArg> for ResumeMode {
    fn from(arg: ResumeArg) -> Self {
        match arg {
            ResumeArg::Skip => Self::Skip,
            ResumeArg::Retry => Self::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_invocation() {
        let cli = Cli::try_parse_from([
            "sherlockbench",
            "openai",
            "0b9f3c2e-5d1a-4c3b-9a8e-7f6d5c4b3a21",
            "--attempts-per-problem",
            "3",
            "--resume=retry",
        ])
        .unwrap();
        assert_eq!(cli.provider, "openai");
        assert_eq!(cli.attempts_per_problem, Some(3));
        assert_eq!(cli.resume, Some(ResumeArg::Retry));
        assert_eq!(ResumeMode::from(ResumeArg::Skip), ResumeMode::Skip);
    }

    #[test]
    fn test_argument_is_optional() {
        let cli = Cli::try_parse_from(["sherlockbench", "anthropic"]).unwrap();
        assert!(cli.arg.is_none());
        assert!(cli.resume.is_none());
    }

    #[test]
    fn test_rejects_unknown_provider_and_mode() {
        assert!(Cli::try_parse_from(["sherlockbench", "acme", "easy3"]).is_err());
        assert!(Cli::try_parse_from(["sherlockbench", "openai", "easy3", "--resume", "later"]).is_err());
    }
}
