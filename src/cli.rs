use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "issue-semsearch",
    about = "Semantic search over issue tracker content",
    version
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(global = true, long, short)]
    pub verbose: bool,

    /// Directory holding settings.json, issues.json and the embeddings/ store
    #[arg(global = true, long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate or refresh the embedding of one issue
    Index {
        /// Issue id
        issue_id: u64,
    },

    /// Re-index every issue through the worker pool (administrators only)
    Sync {
        /// Login of the user running the sync
        #[arg(long = "as", value_name = "LOGIN")]
        as_login: String,

        /// Number of concurrent workers (defaults to settings.json)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Feed a tracker event through the indexing hooks
    Notify {
        #[command(subcommand)]
        event: NotifyCommand,
    },

    /// Find issues similar in meaning to a free-text query
    Search {
        /// Free-text query
        query: String,

        /// Login of the user searching; results are limited to what they can see
        #[arg(long = "as", value_name = "LOGIN")]
        as_login: String,

        /// Maximum number of nearest issues to consider (defaults to settings.json)
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show settings and embedding store statistics
    Status,

    /// Re-declare the store width and clear all stored embeddings
    Migrate {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum NotifyCommand {
    /// An issue was created or edited
    Issue {
        issue_id: u64,

        /// The issue was edited rather than created
        #[arg(long)]
        edited: bool,
    },

    /// A journal was created or edited
    Journal {
        /// Id of the journalized object
        journalized_id: u64,

        /// Type of the journalized object
        #[arg(long = "type", default_value = "Issue")]
        journalized_type: String,

        /// The journal was edited rather than created
        #[arg(long)]
        edited: bool,
    },

    /// A time entry was saved
    TimeEntry {
        /// Issue the time entry is logged against
        #[arg(long)]
        issue: Option<u64>,
    },
}
