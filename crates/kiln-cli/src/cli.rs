//! CLI argument definitions for the kiln driver.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "kiln",
    version,
    about = "kiln - cook and package game-data projects",
    long_about = "Track a tree of editable source resources, cook each into its\n\
                  platform-specific binary form through pluggable backends, and\n\
                  package the cooked outputs into dependency-ordered archives."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project root (default: nearest ancestor containing .kiln).
    #[arg(long = "project", value_name = "DIR", global = true)]
    pub project: Option<PathBuf>,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a kiln project in the current (or given) directory.
    Init,

    /// Track working files in the project database.
    Add(AddArgs),

    /// Untrack working files and delete their cooked outputs.
    Remove(RemoveArgs),

    /// Manage dependency groups (directories packaged contiguously).
    #[command(subcommand)]
    Group(GroupCommand),

    /// Manage cooking/packaging backends.
    #[command(subcommand)]
    Spec(SpecCommand),

    /// Cook working resources into their platform-specific form.
    Cook(CookArgs),

    /// Package cooked outputs into a dependency-ordered archive.
    Package(PackageArgs),

    /// Delete cooked outputs without touching tracked paths.
    Clean(CleanArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    /// Project-relative paths of working files to track.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<String>,
}

#[derive(Parser)]
pub struct RemoveArgs {
    /// Project-relative paths to untrack.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<String>,

    /// Also untrack everything beneath matched directories.
    #[arg(long, short = 'r')]
    pub recursive: bool,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Register a directory as a dependency group.
    Add {
        #[arg(value_name = "DIR")]
        path: String,
    },
    /// Unregister a dependency group.
    Remove {
        #[arg(value_name = "DIR")]
        path: String,
    },
    /// List registered dependency groups.
    List,
}

#[derive(Subcommand)]
pub enum SpecCommand {
    /// List registered backends and their enable state.
    List,
    /// Enable backends by name.
    Enable {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
    /// Disable backends by name.
    Disable {
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },
}

#[derive(Parser)]
pub struct CookArgs {
    /// Project-relative file or directory to cook.
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// Descend into subdirectories.
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Cook even when sources are unchanged.
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Faster draft cooking for supported backends.
    #[arg(long)]
    pub fast: bool,

    /// Abort on the first per-object failure.
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Cook with this backend only.
    #[arg(long = "spec", value_name = "NAME")]
    pub spec: Option<String>,

    /// Cook worker threads (default: in-process, serial).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Parser)]
pub struct PackageArgs {
    /// Project-relative file or directory to package.
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// Faster draft packaging for supported backends.
    #[arg(long)]
    pub fast: bool,

    /// Package with this backend only.
    #[arg(long = "spec", value_name = "NAME")]
    pub spec: Option<String>,

    /// Package worker threads (default: in-process, serial).
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Parser)]
pub struct CleanArgs {
    /// Project-relative file or directory to clean.
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// Descend into subdirectories.
    #[arg(long, short = 'r')]
    pub recursive: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
