//! gopkg - build and install Go packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gopkg_cli::cmd;
use gopkg_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gopkg_core={default_level},gopkg_cli={default_level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            path,
            force,
            output,
            go,
        } => cmd::build::build(&path, force, output.as_deref(), &go),
        Commands::Make {
            import_path,
            path,
            release,
        } => cmd::make::make(&import_path, path.as_deref(), &release),
        Commands::Install { package, from_file } => {
            cmd::install::install(&package, from_file).await
        }
        Commands::Remove { alias } => cmd::remove::remove(&alias),
        Commands::List { installed } => cmd::list::list(installed).await,
        Commands::Config => cmd::config::config(),
    }
}
