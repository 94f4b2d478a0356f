use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(
    name = "zero",
    about = "Turn search phrases into Gmail queries and draft email in your own writing style",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite a search phrase into provider search operators
    Normalize {
        /// Ask the language model when no rule applies
        #[clap(long)]
        synthesize: bool,
        /// Print the query and how it was resolved as JSON
        #[clap(long)]
        json: bool,
        #[clap(required = true, num_args = 1..)]
        phrase: Vec<String>,
    },
    /// Search the mailbox with a natural-language phrase
    Search {
        /// inbox, sent, drafts, starred, spam, trash or archive
        #[clap(long)]
        folder: Option<String>,
        /// Maximum number of threads to list
        #[clap(long)]
        max: Option<u32>,
        #[clap(required = true, num_args = 1..)]
        phrase: Vec<String>,
    },
    /// Print the system and user prompts a draft would be generated from
    Prompt(DraftArgs),
    /// Draft an email body, and optionally send it
    Compose {
        #[clap(flatten)]
        draft: DraftArgs,
        /// Send the draft to the --to recipients
        #[clap(long)]
        send: bool,
    },
    /// Draft a reply-all to a thread, and optionally send it
    Reply {
        thread_id: String,
        #[clap(required = true, num_args = 1..)]
        instruction: Vec<String>,
        /// Writing style profile (JSON); overrides the configured one
        #[clap(long)]
        style: Option<PathBuf>,
        #[clap(long)]
        send: bool,
    },
    /// Show how a writing style profile is bucketed
    Style { file: PathBuf },
    /// Store the API key and Gmail access token
    Setup,
}

#[derive(Debug, Args)]
pub struct DraftArgs {
    /// What the email should say
    #[clap(long, short)]
    pub instruction: String,
    /// Recipient address; repeat for several
    #[clap(long)]
    pub to: Vec<String>,
    #[clap(long)]
    pub subject: Option<String>,
    /// Gmail thread to use as context
    #[clap(long)]
    pub thread: Option<String>,
    /// Writing style profile (JSON); overrides the configured one
    #[clap(long)]
    pub style: Option<PathBuf>,
}
