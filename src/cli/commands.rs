//! CLI command definitions using clap.
//!
//! - run: orchestrate one or more tasks in one or more modes
//! - tasks: list the task catalog
//! - tools: list the tool registry
//! - compare: summarize stored reports per mode

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stratloop::orchestrator::RunMode;

/// Stratloop - generate, check and repair trading strategies with a language model
#[derive(Parser, Debug)]
#[command(name = "stratloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Agentic,
    SingleShot,
    PureLlm,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Agentic => RunMode::Agentic,
            ModeArg::SingleShot => RunMode::SingleShot,
            ModeArg::PureLlm => RunMode::PureLlm,
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tasks through the repair loop
    Run {
        /// Catalog task id (repeatable)
        #[arg(short, long = "task")]
        tasks: Vec<String>,

        /// Free-text or JSON request instead of a task id
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the request from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Run mode (repeatable, default agentic)
        #[arg(short, long = "mode", value_enum)]
        modes: Vec<ModeArg>,

        /// Override the configured attempt budget
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Runs in flight at once
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },

    /// List catalog tasks
    Tasks,

    /// List registered tools
    Tools,

    /// Summarize stored reports by mode
    Compare {
        /// Reports directory (defaults to the configured one)
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["stratloop"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["stratloop", "-v", "-c", "/path/to/stratloop.yml", "tasks"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/stratloop.yml")));
        assert!(matches!(cli.command, Commands::Tasks));
    }

    #[test]
    fn test_run_repeatable_tasks_and_modes() {
        let cli = Cli::try_parse_from([
            "stratloop",
            "run",
            "--task",
            "momentum_daily",
            "--task",
            "breakout",
            "--mode",
            "agentic",
            "--mode",
            "pure-llm",
            "--jobs",
            "4",
            "--max-attempts",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                tasks,
                modes,
                jobs,
                max_attempts,
                prompt,
                ..
            } => {
                assert_eq!(tasks, vec!["momentum_daily", "breakout"]);
                assert_eq!(modes, vec![ModeArg::Agentic, ModeArg::PureLlm]);
                assert_eq!(jobs, 4);
                assert_eq!(max_attempts, Some(3));
                assert!(prompt.is_none());
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["stratloop", "run", "-t", "breakout"]).unwrap();
        match cli.command {
            Commands::Run { modes, jobs, max_attempts, .. } => {
                assert!(modes.is_empty());
                assert_eq!(jobs, 1);
                assert!(max_attempts.is_none());
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_prompt_conflicts_with_prompt_file() {
        let result = Cli::try_parse_from(["stratloop", "run", "--prompt", "task: breakout", "--prompt-file", "req.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compare_dir() {
        let cli = Cli::try_parse_from(["stratloop", "compare", "/tmp/runs"]).unwrap();
        match cli.command {
            Commands::Compare { dir } => assert_eq!(dir, Some(PathBuf::from("/tmp/runs"))),
            _ => panic!("Expected compare command"),
        }
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(RunMode::from(ModeArg::SingleShot), RunMode::SingleShot);
    }
}
