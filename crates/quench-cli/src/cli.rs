use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quench_core::Stage;

#[derive(Parser, Debug)]
#[command(
    name = "quench",
    about = "Quality orchestration for Python projects",
    version
)]
pub struct Cli {
    /// Path to quench.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root (overrides the config file).
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one analysis stage and report its findings.
    Check {
        #[arg(long, value_enum, default_value_t = Stage::Comprehensive)]
        stage: Stage,
    },
    /// Run the autofix loop until clean, stuck, or out of budget.
    Fix,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_defaults() {
        let cli = Cli::try_parse_from(["quench", "check"]).unwrap();
        match cli.command {
            Command::Check { stage } => assert_eq!(stage, Stage::Comprehensive),
            other => panic!("expected check, got {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_check_fast_stage_json() {
        let cli =
            Cli::try_parse_from(["quench", "check", "--stage", "fast", "--format", "json"])
                .unwrap();
        match cli.command {
            Command::Check { stage } => assert_eq!(stage, Stage::Fast),
            other => panic!("expected check, got {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_fix_with_workspace() {
        let cli = Cli::try_parse_from(["quench", "fix", "--workspace", "/tmp/project"]).unwrap();
        assert!(matches!(cli.command, Command::Fix));
        assert_eq!(cli.workspace.as_deref(), Some(std::path::Path::new("/tmp/project")));
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!(Cli::try_parse_from(["quench", "check", "--stage", "warp"]).is_err());
    }
}
