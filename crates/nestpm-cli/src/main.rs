#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use nestpm_core::pkg::{InstallOptions, DEFAULT_MAX_DEPTH};
use nestpm_core::Config;
use miette::Result;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "nestpm")]
#[command(author, version, about = "Nested npm-style package installer", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Install packages and their dependency trees
    Install {
        /// Package specs: name, name@version, name@range, git+URI#branch, or a tarball URL
        #[arg(required = true)]
        specs: Vec<String>,

        /// Directory the packages are installed into (default: ./node_modules)
        #[arg(long, value_name = "PATH")]
        out_dir: Option<PathBuf>,

        /// Remove test/ and tests/ from every installed package
        #[arg(long)]
        delete_test_folders: bool,

        /// Ignore cached registry documents and tarballs on first fetch
        #[arg(long)]
        force_update: bool,

        /// Registry base URL
        #[arg(long, value_name = "URL")]
        registry: Option<String>,

        /// Blob cache directory
        #[arg(long, value_name = "PATH")]
        cache_dir: Option<PathBuf>,

        /// Do not look for tarballs in the local npm cache
        #[arg(long)]
        no_local_cache: bool,

        /// Directory for temporary extraction and clone directories
        #[arg(long, value_name = "PATH")]
        scratch_dir: Option<PathBuf>,

        /// Maximum nested dependency depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Manage the blob cache
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// Remove every cached registry document and tarball
    Clean,
    /// Print the cache directory
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = match Config::load(cwd) {
        Ok(config) => config,
        Err(e) => commands::fail(cli.json, commands::CONFIG_INVALID, &e.to_string()),
    }
    .with_verbosity(cli.verbose)
    .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Install {
            specs,
            out_dir,
            delete_test_folders,
            force_update,
            registry,
            cache_dir,
            no_local_cache,
            scratch_dir,
            max_depth,
        }) => {
            let mut config = config;
            if let Some(registry) = registry {
                config = config.with_registry(registry);
            }
            if let Some(dir) = cache_dir {
                let dir = absolute(&config.cwd, dir);
                config = config.with_cache_dir(dir);
            }
            if no_local_cache {
                config = config.with_local_tarball_root(None);
            }

            let out_dir = out_dir.map_or_else(
                || config.cwd.join("node_modules"),
                |dir| absolute(&config.cwd, dir),
            );
            let options = InstallOptions {
                delete_test_folders,
                force_update,
                scratch_dir: scratch_dir.map(|dir| absolute(&config.cwd, dir)),
                max_depth,
            };

            commands::install::run(&config, &specs, &out_dir, options, cli.json)
        }
        Some(Commands::Cache { cache_cmd }) => match cache_cmd {
            CacheCommands::Clean => commands::cache::clean(&config, cli.json),
            CacheCommands::Path => commands::cache::path(&config, cli.json),
        },
    }
}

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
