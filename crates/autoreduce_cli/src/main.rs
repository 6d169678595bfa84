//! autoreduce CLI
//!
//! Command-line tools for automatic map-reduce indexes stored in a
//! directory.
//!
//! # Commands
//!
//! - `create` - Define a new index
//! - `map` - Apply documents from a JSON-lines file
//! - `delete` - Delete documents by key
//! - `inspect` - Show an index's definition, counters and buckets
//! - `results` - Reduce every bucket and print the results

mod commands;
mod json;

use clap::{Parser, Subcommand};
use commands::create::CreateArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// autoreduce index tools.
#[derive(Parser)]
#[command(name = "autoreduce")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the environment directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Define a new index
    Create {
        /// Index name
        #[arg(short, long)]
        name: String,

        /// Source collection
        #[arg(short, long, default_value = "")]
        collection: String,

        /// Group-by field path (repeatable)
        #[arg(short, long = "group-by", required = true)]
        group_by: Vec<String>,

        /// Summed field path (repeatable)
        #[arg(short, long)]
        sum: Vec<String>,

        /// Count field name (repeatable)
        #[arg(long)]
        count: Vec<String>,
    },

    /// Apply documents from a JSON-lines file
    Map {
        /// Index name
        #[arg(short, long)]
        name: String,

        /// Input file; each line is {"key": ..., "doc": {...}}
        #[arg(short, long)]
        input: PathBuf,

        /// Documents per batch
        #[arg(short, long, default_value = "1024")]
        batch_size: usize,
    },

    /// Delete documents by key
    Delete {
        /// Index name
        #[arg(short, long)]
        name: String,

        /// Document key (repeatable)
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,
    },

    /// Show an index's definition, counters and buckets
    Inspect {
        /// Index name; lists all indexes when omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Show every non-empty bucket
        #[arg(short, long)]
        buckets: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reduce every bucket and print the results
    Results {
        /// Index name
        #[arg(short, long)]
        name: String,

        /// Pretty-print each result
        #[arg(long)]
        pretty: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Create {
            name,
            collection,
            group_by,
            sum,
            count,
        } => {
            let path = cli.path.ok_or("Environment path required for create")?;
            let args = CreateArgs {
                name,
                collection,
                group_by,
                sum,
                count,
            };
            commands::create::run(&path, &args)?;
        }
        Commands::Map {
            name,
            input,
            batch_size,
        } => {
            let path = cli.path.ok_or("Environment path required for map")?;
            commands::map::run(&path, &name, &input, batch_size)?;
        }
        Commands::Delete { name, keys } => {
            let path = cli.path.ok_or("Environment path required for delete")?;
            commands::delete::run(&path, &name, &keys)?;
        }
        Commands::Inspect {
            name,
            buckets,
            format,
        } => {
            let path = cli.path.ok_or("Environment path required for inspect")?;
            commands::inspect::run(&path, name.as_deref(), buckets, &format)?;
        }
        Commands::Results { name, pretty } => {
            let path = cli.path.ok_or("Environment path required for results")?;
            commands::results::run(&path, &name, pretty)?;
        }
        Commands::Version => {
            println!("autoreduce CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("autoreduce core v{}", autoreduce_core::VERSION);
        }
    }

    Ok(())
}
