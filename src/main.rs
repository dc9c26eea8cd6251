//! # Registry Credentials Controller
//!
//! Process entrypoint: parses the startup flags, wires the registry
//! provider, secret store and refresher together, and blocks until the
//! refresh task exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use registry_creds_controller::errors::Error;
use registry_creds_controller::refresher::Refresher;
use registry_creds_controller::registry::{self, Binding};
use registry_creds_controller::store::KubeSecretStore;

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogsFormat {
    /// Human-readable single-line output
    Human,
    /// JSON structured output
    Json,
}

/// Keeps a Kubernetes pull-secret refreshed with short-lived registry
/// credentials
#[derive(Parser, Debug)]
#[command(name = "registry-creds-controller", version)]
struct Args {
    /// Docker registry kind to authenticate against
    #[arg(long, default_value = registry::ECR_REGISTRY_KIND)]
    registry_kind: String,

    /// Secret name to create or update with refreshed registry credentials
    #[arg(long)]
    secret_name: String,

    /// Kubernetes namespace to create the secret in (defaults to `default`)
    #[arg(long, default_value = "")]
    namespace: String,

    /// Registry URI the pull-secret authenticates against
    #[arg(long)]
    registry_uri: Option<String>,

    /// Refresh credentials rate in minutes
    #[arg(long, default_value_t = 60)]
    refresh_interval: u64,

    /// Credentials to retrieve the registry authorization token, as a JSON
    /// document (optionally base64-encoded); entries must be in
    /// lowerCamelCase
    #[arg(long, default_value = "")]
    creds: String,

    /// Kubernetes config path; uses in-cluster config when not specified
    #[arg(long)]
    kubeconfig_path: Option<PathBuf>,

    /// Allow verbose logging
    #[arg(long)]
    verbose: bool,

    /// Logging format
    #[arg(long, value_enum, default_value_t = LogsFormat::Human)]
    logs_format: LogsFormat,
}

fn init_tracing(args: &Args) {
    let default_filter = if args.verbose {
        "registry_creds_controller=debug"
    } else {
        "registry_creds_controller=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    match args.logs_format {
        LogsFormat::Human => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogsFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn kube_client(kubeconfig_path: Option<&PathBuf>) -> Result<Client> {
    match kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).context("Failed to read kubeconfig")?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load kubeconfig")?;
            Client::try_from(config).context("Failed to create Kubernetes client")
        }
        None => Client::try_default()
            .await
            .context("Failed to create Kubernetes client"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    info!("Starting registry credentials controller");

    let client = kube_client(args.kubeconfig_path.as_ref()).await?;

    let binding = Binding {
        secret_name: args.secret_name.clone(),
        namespace: args.namespace.clone(),
        registry_uri: args.registry_uri.clone(),
    };
    let provider = registry::create_registry(&args.registry_kind, binding, &args.creds)
        .context("Failed to create registry provider")?;

    let store = Arc::new(KubeSecretStore::new(client));
    let refresher = Refresher::new(provider, store, &args.registry_kind, args.refresh_interval);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        signal_cancel.cancel();
    });

    // The refresher task owns the timer; main blocks on its join handle.
    let handle = tokio::spawn(async move { refresher.run(cancel).await });
    match handle.await.context("Refresher task panicked")? {
        Ok(()) | Err(Error::Cancelled) => {
            info!("Registry credentials controller stopped");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
