use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fontscout")]
#[command(about = "Find the fonts your Motion templates depend on", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder of templates and rebuild the font index
    Scan {
        /// Folder to scan (defaults to `root_path` from the configuration)
        root: Option<PathBuf>,
        /// Maximum number of files read at once
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Descend into hidden folders
        #[arg(long)]
        include_hidden: bool,
        /// Skip checking fonts against the installed catalog
        #[arg(long)]
        no_resolve: bool,
    },
    /// Full-text search over indexed font names and paths
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Occurrence counts per font and file type
    Summary {
        #[arg(default_value = "")]
        query: String,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display the number of indexed font occurrences
    Count,
    /// List indexed occurrences in insertion order
    Fonts {
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Re-check indexed fonts against the installed catalog
    Resolve,
    /// List fonts that are not installed
    Missing,
    /// Print configuration values
    PrintConfig,
    /// Delete every indexed occurrence and cached resolution
    TruncateDb,
}
