//! `clap` derive definitions for the `uniast` CLI surface (§6).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "uniast", version, about = "Multi-language repository indexer that emits a Universal AST graph")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// `error` | `warn` | `info` | `debug` | `trace`, or an `env_filter` directive string.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Path to an alternate config file, overriding `.uniast/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Language {
    Go,
    #[value(alias = "ts", alias = "js")]
    Typescript,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum MonorepoMode {
    #[default]
    Combined,
    Separate,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parses a repository and emits its Universal AST.
    Parse(ParseArgs),
    /// Hidden worker-mode entrypoint: reads a batch of package paths as
    /// a JSON array on the given fd and streams `WorkerMessage`s back on
    /// stdout. Not part of the public CLI contract.
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        worker_fd: i32,
    },
}

#[derive(Debug, Parser)]
pub struct ParseArgs {
    pub language: Language,
    pub repo_dir: PathBuf,

    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 0)]
    pub refer_code_depth: u32,

    #[arg(long, default_value_t = false)]
    pub need_test: bool,

    #[arg(long, default_value_t = false)]
    pub collect_comment: bool,

    #[arg(long, value_delimiter = ',')]
    pub excludes: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub load_by_packages: bool,

    #[arg(long)]
    pub tsconfig: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_dist: bool,

    #[arg(long, value_enum, default_value_t = MonorepoMode::Combined)]
    pub monorepo_mode: MonorepoMode,

    #[arg(long, value_delimiter = ',')]
    pub src: Vec<String>,

    /// Overrides the work distributor's computed worker count.
    #[arg(long)]
    pub workers: Option<usize>,
}
