//! volumegroup-controller - converges VolumeGroupSnapshots into CSI VolumeSnapshots

use clap::Parser;
use futures::future::join_all;
use kube::Client;

use volumegroup::config::{Cli, Command};
use volumegroup::retry::{retry_with_backoff, RetryConfig};
use volumegroup::runner::{build_controllers, crds_yaml, install_crds};
use volumegroup::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "fips")]
    {
        if let Err(e) = aws_lc_rs::try_fips_mode() {
            eprintln!("CRITICAL: FIPS feature is enabled but FIPS mode failed to initialize: {e}");
            std::process::exit(1);
        }
    }

    let cli = Cli::parse();

    if cli.resolved_command() == Command::Crd {
        println!("{}", crds_yaml()?);
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        log_format: cli.log_format,
        ..Default::default()
    })?;

    let requeue = cli.controller.requeue_config()?;

    let client = retry_with_backoff(&RetryConfig::default(), "kube-client", Client::try_default)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if cli.controller.install_crds {
        install_crds(&client).await?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        poll_secs = requeue.poll_interval.as_secs(),
        jitter = requeue.jitter,
        "Starting volume group snapshot controllers"
    );

    let controllers = build_controllers(client, cli.controller.namespace.as_deref(), requeue);
    join_all(controllers).await;

    tracing::info!("Controllers stopped");
    Ok(())
}
