//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;
use kiln::util::shell::ColorChoice;

/// Kiln - a cross-platform build-file generator for C-family projects
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto", env = "KILN_COLOR")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate build files for a source tree
    Generate(GenerateArgs),

    /// Run the native build tool in a generated tree
    Build(BuildArgs),

    /// Run the tests registered in a generated tree
    Test(TestArgs),

    /// List declared targets
    Targets(TargetsArgs),

    /// Manage the compiler and rule caches of a build tree
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct TreeArgs {
    /// Top-level source directory (defaults to the outermost Kiln.toml above cwd)
    #[arg(short = 'S', long = "source-dir")]
    pub source_dir: Option<PathBuf>,

    /// Binary directory
    #[arg(short = 'B', long = "build-dir", default_value = "build")]
    pub binary_dir: PathBuf,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Backend to generate for (makefiles, manifest)
    #[arg(long)]
    pub backend: Option<String>,

    /// Do not emit install rules
    #[arg(long)]
    pub no_install_rules: bool,

    /// Also write IDE metadata (compile-db)
    #[arg(long)]
    pub ide_metadata: Option<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Binary directory
    #[arg(short = 'B', long = "build-dir", default_value = "build")]
    pub binary_dir: PathBuf,

    /// Build a single target instead of the default goal
    #[arg(long)]
    pub target: Option<String>,

    /// Kill the build tool after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct TestArgs {
    /// Binary directory
    #[arg(short = 'B', long = "build-dir", default_value = "build")]
    pub binary_dir: PathBuf,

    /// Kill each test after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct TargetsArgs {
    #[command(flatten)]
    pub tree: TreeArgs,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove compiler caches, rule hashes and the workspace cache
    Clear {
        /// Binary directory
        #[arg(short = 'B', long = "build-dir", default_value = "build")]
        binary_dir: PathBuf,
    },
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
