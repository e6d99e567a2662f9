use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use huddle_core::EntityKind;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Shared lists, notes and polls that work offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote and session configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage groups
    #[command(subcommand)]
    Group(GroupCommands),
    /// Manage lists
    #[command(subcommand)]
    List(ListCommands),
    /// Manage list items
    #[command(subcommand)]
    Item(ItemCommands),
    /// Manage notes on a list
    #[command(subcommand)]
    Note(NoteCommands),
    /// Manage comments on an item
    #[command(subcommand)]
    Comment(CommentCommands),
    /// Manage polls on a list
    #[command(subcommand)]
    Poll(PollCommands),
    /// Delete a record and everything under it
    #[command(alias = "rm")]
    Delete {
        /// Kind of record to delete
        #[arg(value_enum)]
        kind: KindArg,
        /// Record ID (temporary or server-assigned)
        id: String,
    },
    /// Push queued changes, then pull the server's state
    Sync {
        /// Keep syncing on an interval until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Inspect the outbound queue
    Queue {
        /// Return failed entries to the pending state
        #[arg(long)]
        retry_failed: bool,
        /// Remove completed entries
        #[arg(long)]
        prune: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Manage CLI profile configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Manage account sessions
    #[command(subcommand)]
    Auth(AuthCommands),
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a group
    Create {
        /// Group name
        name: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Create a list
    Create {
        /// List title
        title: Vec<String>,
        /// Group to place the list in
        #[arg(long, value_name = "ID")]
        group: Option<String>,
    },
    /// Show a list with its items, notes and polls
    Show {
        /// List ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all lists
    #[command(alias = "list")]
    Ls {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Add an item to a list
    Add {
        /// List ID
        list: String,
        /// Item content
        content: Vec<String>,
        /// Sort position within the list
        #[arg(long, default_value = "0")]
        position: i64,
    },
    /// Flip an item's checked state
    Toggle {
        /// Item ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Attach a note to a list
    Add {
        /// List ID
        list: String,
        /// Note body
        body: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CommentCommands {
    /// Comment on an item
    Add {
        /// Item ID
        item: String,
        /// Comment body
        body: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PollCommands {
    /// Create a poll on a list
    Create {
        /// List ID
        list: String,
        /// Poll question
        question: String,
        /// Answer option (repeat for each option)
        #[arg(short = 'o', long = "option", value_name = "LABEL", required = true)]
        options: Vec<String>,
    },
    /// Vote for an option by its position (starting at 0)
    Vote {
        /// Poll ID
        id: String,
        /// Option index
        option: usize,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update a CLI profile
    Init {
        /// Profile name (defaults to active profile or `default`)
        #[arg(long)]
        profile: Option<String>,
        /// Remote API base URL
        #[arg(long)]
        api_base_url: Option<String>,
        /// Seconds between background sync cycles
        #[arg(long, value_name = "SECS")]
        sync_interval: Option<u64>,
        /// Keep the current active profile unchanged
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in and take ownership of records created while signed out
    Login {
        /// Profile name (defaults to active profile or `default`)
        #[arg(long)]
        profile: Option<String>,
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },
    /// Show the stored session for a profile
    Status {
        /// Profile name (defaults to active profile or `default`)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Forget the stored session for a profile
    Logout {
        /// Profile name (defaults to active profile or `default`)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Group,
    List,
    Item,
    Note,
    Comment,
    Poll,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Group => Self::Group,
            KindArg::List => Self::List,
            KindArg::Item => Self::Item,
            KindArg::Note => Self::Note,
            KindArg::Comment => Self::Comment,
            KindArg::Poll => Self::Poll,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
