//! mxpack CLI tool.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;

/// Exit status after an interrupt, as shells report SIGINT.
const INTERRUPTED_EXIT: u8 = 130;

#[derive(Parser)]
#[command(name = "mxpack")]
#[command(about = "Build Mendix deployment directories in containers", long_about = None)]
struct Cli {
    /// Build configuration file
    #[arg(long, global = true, env = "MXPACK_CONFIG", default_value = "mxpack.kdl")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a deployment directory from a project, package or archive
    BuildMdaDir {
        /// Project directory, project file, package or deployment archive
        #[arg(long)]
        source: PathBuf,
        /// Output directory; existing contents are removed
        #[arg(long)]
        destination: PathBuf,
        /// Registry used to cache builder images
        #[arg(long, env = "MXPACK_ARTIFACTS_REPOSITORY")]
        artifacts_repository: Option<String>,
    },
    /// Download build dependencies for offline builds
    Prefetch {
        /// Project source used to detect the product version
        #[arg(long, default_value = "build-source")]
        source: PathBuf,
        /// Buildpack archive to download
        #[arg(long)]
        buildpack_url: Option<Url>,
        /// Directory to store downloads in
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Validate a build configuration file
    Validate {
        /// Path to the configuration file (defaults to --config)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if commands::watch_interrupts(tokio::signal::ctrl_c, interrupt).await {
            std::process::exit(INTERRUPTED_EXIT.into());
        }
    });

    let result = match cli.command {
        Commands::BuildMdaDir {
            source,
            destination,
            artifacts_repository,
        } => {
            commands::build::build_mda_dir(
                &cli.config,
                &source,
                &destination,
                artifacts_repository,
                &cancel,
            )
            .await
        }
        Commands::Prefetch {
            source,
            buildpack_url,
            cache_dir,
        } => commands::prefetch::prefetch(&cli.config, &source, buildpack_url, cache_dir, &cancel).await,
        Commands::Validate { path } => commands::validate::validate(path.as_deref().unwrap_or(&cli.config)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if commands::is_cancelled(&e) => {
            error!("Build cancelled");
            ExitCode::from(INTERRUPTED_EXIT)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
