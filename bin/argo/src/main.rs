#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Driver and prover client for Argo rollup chains.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use argo_config::{Opts, RoleOpts};
use argo_driver::Driver;
use argo_primitives::shutdown::ShutdownSignal;
use argo_prover::Prover;

mod allocator;
use allocator::{Allocator, new_allocator};

#[global_allocator]
static ALLOC: Allocator = new_allocator();

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        // Try from custom env file, and abort if it fails
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try from default .env file, and ignore if it fails. It might
        // be that the user isn't using it.
        dotenvy::dotenv().ok();
    }

    let opts = Opts::parse();
    opts.telemetry.setup(&opts.instance_name)?;

    let cancel = CancellationToken::new();
    let shutdown = ShutdownSignal::new();

    match opts.role.clone() {
        RoleOpts::Driver(driver_opts) => {
            let driver = Driver::init_from_config(cancel.clone(), &opts, &driver_opts).await?;
            info!(role = driver.name(), "🧑‍🚀 Argo starting...");

            let handle = driver.start();
            shutdown.wait().await;

            info!("👋 Argo shutting down...");
            handle.close().await;
        }
        RoleOpts::Prover(prover_opts) => {
            let prover = Prover::init_from_config(cancel.clone(), &opts, &prover_opts).await?;
            info!(role = prover.name(), "🧑‍🚀 Argo starting...");

            let handle = prover.start();
            shutdown.wait().await;

            info!("👋 Argo shutting down...");
            handle.close().await;
        }
    }

    Ok(())
}
