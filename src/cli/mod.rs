pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "threadwatch")]
#[command(about = "Watch imageboard threads and catalogs from the terminal", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered sites
    Sites {
        #[command(subcommand)]
        action: SiteAction,
    },
    /// List the boards of a site
    Boards {
        /// Site id
        site: i64,

        /// Fetch the board list from the site before listing
        #[arg(long)]
        refresh: bool,
    },
    /// Add a board to a site that cannot list its boards
    AddBoard {
        /// Site id
        site: i64,

        /// Board code, e.g. "b"
        code: String,

        /// Display name (defaults to the code)
        #[arg(long)]
        name: Option<String>,
    },
    /// Show which site, board and thread a URL points at
    Resolve {
        url: String,
    },
    /// Follow a thread or catalog, printing new posts as they arrive
    Watch {
        /// Thread or board URL
        url: String,
    },
    /// Post a reply, or a new thread when given a board URL
    Post {
        /// Thread or board URL
        url: String,

        #[arg(long)]
        comment: String,

        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, default_value = "")]
        subject: String,

        /// Email field, e.g. "sage"
        #[arg(long, default_value = "")]
        options: String,

        /// File to attach
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        spoiler: bool,

        /// Solved captcha response token
        #[arg(long)]
        captcha: Option<String>,

        /// Captcha challenge, for captchas that have one
        #[arg(long)]
        challenge: Option<String>,

        /// Password for deleting the post later
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete one of your posts
    Delete {
        /// URL of the thread containing the post
        url: String,

        /// Post number
        #[arg(long)]
        post: u64,

        #[arg(long)]
        password: String,

        /// Only remove the attached file
        #[arg(long)]
        image_only: bool,
    },
}

#[derive(Subcommand)]
pub enum SiteAction {
    /// List registered sites in display order
    List,
    /// Register a site ("4chan" or "2ch")
    Add {
        kind: String,
    },
    /// Unregister a site along with its boards
    Remove {
        id: i64,
    },
    /// Set the display order of sites
    Order {
        ids: Vec<i64>,
    },
    /// Replace a site's settings with a JSON object
    Settings {
        id: i64,
        json: String,
    },
}
