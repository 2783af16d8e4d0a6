//! rig - pinned CLI tools, verified

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rig_cli::cmd;
use rig_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("RIG_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let root_dir = cli.root_dir.as_deref();

    match cli.command {
        Commands::Install {
            only_link,
            skip_link,
            test,
            copy_dir,
            tags,
            exclude_tags,
        } => {
            let opts = rig_core::InstallOptions {
                only_link,
                skip_link,
                test,
                copy_dir,
                tags,
                exclude_tags,
                max_parallelism: rig_core::max_parallelism(),
            };
            cmd::install::install(config, root_dir, opts).await
        }
        Commands::UpdateChecksum { deep, all } => {
            cmd::update_checksum::update_checksum(
                config,
                rig_core::BackfillOptions { deep, all },
            )
            .await
        }
    }
}
