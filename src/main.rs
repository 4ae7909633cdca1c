use anyhow::Result;
use clap::Parser;
use depmirror::commands::{self, Options};
use depmirror::runtime::RealRuntime;
use std::path::PathBuf;
use std::sync::Arc;

/// depmirror - Composer dependency mirror
///
/// Resolve the full dependency graph of Composer packages via Packagist and
/// keep a local git mirror of every repository in it.
///
/// Examples:
///   depmirror mirror                          # Mirror everything in medusa.json
///   depmirror add symfony/console --with-deps # Mirror one package and its dependencies
///   depmirror update                          # Fetch new commits into all mirrors
#[derive(Parser, Debug)]
#[command(author, version = env!("DEPMIRROR_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./medusa.json, then the user config directory)
    #[arg(
        long = "config",
        short = 'c',
        env = "DEPMIRROR_CONFIG",
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers (defaults to the number of CPUs)
    #[arg(
        long = "workers",
        short = 'w',
        env = "DEPMIRROR_WORKERS",
        value_name = "N",
        value_parser = clap::value_parser!(usize),
        global = true
    )]
    pub workers: Option<usize>,

    /// Registry URL (defaults to https://packagist.org)
    #[arg(long = "registry-url", value_name = "URL", global = true)]
    pub registry_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Mirror all configured packages and their dependencies
    Mirror,

    /// Mirror a single package
    Add(AddArgs),

    /// Update all existing mirrors
    Update,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// The package in the format "vendor/project"
    #[arg(value_name = "VENDOR/PROJECT")]
    pub package: String,

    /// Resolve and mirror the package's dependencies as well
    #[arg(long = "with-deps", short = 'd')]
    pub with_deps: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            config_path: self.config.clone(),
            workers: self.workers,
            registry_url: self.registry_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let options = cli.options();
    let runtime = Arc::new(RealRuntime);

    match cli.command {
        Commands::Mirror => commands::mirror(runtime, &options).await?,
        Commands::Add(args) => {
            commands::add(runtime, &options, &args.package, args.with_deps).await?
        }
        Commands::Update => commands::update(runtime, &options).await?,
    }
    Ok(())
}
