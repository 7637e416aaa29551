//! Verso CLI
//!
//! Command-line access to a directory of versioned resources.
//!
//! # Commands
//!
//! - `put` - Write a new version of a key
//! - `get` - Read the current or a retained version
//! - `versions` - List the retained versions of a key
//! - `restore` - Make a retained version current again
//! - `rm` - Erase a key and its history
//! - `changed` - Check whether a key moved past a known version
//! - `cleanup` - Trim histories to the configured depth
//! - `purge` - Delete unindexed snapshots of a key
//! - `ls` - List keys with their versions

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Versioned key/value storage tools.
#[derive(Parser)]
#[command(name = "verso")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the versioned resources
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Number of historical versions retained per key
    #[arg(global = true, long, default_value_t = verso_core::DEFAULT_MAX_HISTORY)]
    max_history: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new version of a key
    Put {
        /// Key to write
        key: String,

        /// File whose content becomes the new version
        #[arg(required_unless_present = "value")]
        file: Option<PathBuf>,

        /// Literal text to store instead of a file
        #[arg(long, conflicts_with = "file")]
        value: Option<String>,
    },

    /// Read the current or a retained version of a key
    Get {
        /// Key to read
        key: String,

        /// Version to read (0 reads the current content)
        #[arg(long, default_value = "0")]
        version: u32,

        /// Write the content to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the retained versions of a key
    Versions {
        /// Key to inspect
        key: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Make a retained version current again as a new version
    Restore {
        /// Key to restore
        key: String,

        /// Retained version to copy forward
        version: u32,
    },

    /// Erase a key with its metadata and every snapshot
    Rm {
        /// Key to erase
        key: String,
    },

    /// Check whether a key has been written since a known version
    Changed {
        /// Key to check
        key: String,

        /// Last version the caller has seen
        since: u32,
    },

    /// Evict snapshots beyond the configured history depth
    Cleanup {
        /// Only clean up this key (default: every key)
        key: Option<String>,
    },

    /// Delete snapshots of a key that its metadata no longer indexes
    Purge {
        /// Key to purge
        key: String,
    },

    /// List keys with their current versions
    Ls {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging on stderr so `get` output stays clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let open = |create_if_missing: bool| -> Result<commands::Store, Box<dyn std::error::Error>> {
        let root = cli.root.as_deref().ok_or("storage root required (--root)")?;
        commands::open_store(root, cli.max_history, create_if_missing)
    };

    match cli.command {
        Commands::Put { ref key, ref file, ref value } => {
            let store = open(true)?;
            let data = match (file, value) {
                (Some(path), _) => std::fs::read(path)?,
                (None, Some(text)) => text.clone().into_bytes(),
                (None, None) => return Err("either <FILE> or --value is required".into()),
            };
            commands::put::run(&store, key, &data)?;
        }
        Commands::Get { ref key, version, ref out } => {
            commands::get::run(&open(false)?, key, version, out.as_deref())?;
        }
        Commands::Versions { ref key, ref format } => {
            commands::versions::run(&open(false)?, key, format)?;
        }
        Commands::Restore { ref key, version } => {
            commands::restore::run(&open(false)?, key, version)?;
        }
        Commands::Rm { ref key } => {
            commands::maintenance::remove(&open(false)?, key)?;
        }
        Commands::Changed { ref key, since } => {
            commands::versions::changed(&open(false)?, key, since)?;
        }
        Commands::Cleanup { ref key } => {
            commands::maintenance::cleanup(&open(false)?, key.as_deref())?;
        }
        Commands::Purge { ref key } => {
            commands::maintenance::purge(&open(false)?, key)?;
        }
        Commands::Ls { ref format } => {
            commands::list::run(&open(false)?, format)?;
        }
        Commands::Version => {
            println!("Verso CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Verso Core v{}", verso_core::VERSION);
        }
    }

    Ok(())
}
