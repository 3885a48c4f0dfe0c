use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dbdesk", about = "Browse, query, import and export embedded database files")]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, global = true, env = "DBDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit diagnostics to stderr
    #[arg(short = 'v', long, global = true, env = "DBDESK_VERBOSE")]
    pub verbose: bool,

    /// Database file to open
    #[arg(short = 'd', long, global = true, env = "DBDESK_DATABASE")]
    pub database: Option<PathBuf>,

    /// Config file profile name
    #[arg(short = 'P', long, global = true, env = "DBDESK_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a database file (an existing file is opened, not truncated)
    Create(CreateArgs),

    /// Show the open database's path, size and table count
    Info,

    /// List tables with their row counts
    Tables,

    /// Execute one statement
    Query(QueryArgs),

    /// Execute statements read line by line from stdin
    Shell,

    /// Import a .csv or .json file into a table named after the file
    Import(ImportArgs),

    /// Export a table to .csv, .json or .xlsx
    Export(ExportArgs),

    /// Show a bounded, optionally filtered view of a table
    Browse(BrowseArgs),

    /// Copy the database file to a timestamped backup next to it
    Backup,

    /// Rebuild the database file to reclaim free space
    Compact,
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Path of the database file
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// SQL statement text
    pub sql: Option<String>,

    /// Read the statement from a file
    #[arg(short = 'f', long = "file", conflicts_with = "sql")]
    pub sql_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Source file (.csv or .json)
    pub file: PathBuf,

    /// Rows per chunk for CSV imports (default: 10000)
    #[arg(long, env = "DBDESK_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Table to export
    pub table: String,

    /// Destination file (.csv, .json or .xlsx)
    pub file: PathBuf,

    /// Rows per chunk for CSV exports (default: 10000)
    #[arg(long, env = "DBDESK_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct BrowseArgs {
    /// Table to browse
    pub table: String,

    /// Max rows to load (default: 1000)
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Load every row
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    /// Keep only rows with a cell containing this text (case-insensitive)
    #[arg(long)]
    pub filter: Option<String>,
}
