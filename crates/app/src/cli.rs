use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Guided lab runner
#[derive(Parser, Debug)]
#[command(name = "labctl")]
#[command(about = "Run guided science labs and track XP", long_about = None)]
#[command(version)]
pub struct Cli {
    /// `SQLite` database URL or file path
    #[arg(long, global = true, env = "LAB_DB_URL", default_value = "sqlite://labs.sqlite3")]
    pub db: String,

    /// TOML file with XP policy overrides and extra labs
    #[arg(long, global = true, env = "LAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Force narration to finish after this many milliseconds
    #[arg(long, global = true)]
    pub narration_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a lab from its intro to completion
    Run {
        /// Lab id, see `labctl labs`
        lab_id: String,

        /// Comma-separated quiz answers in question order; repeat for a retry
        #[arg(long = "answers", value_name = "A,B,C")]
        answers: Vec<String>,
    },

    /// Show completed labs and total XP
    Progress {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// List available labs
    Labs,
}
