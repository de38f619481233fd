mod cli;
mod commands;
mod observability;
mod output;
mod state;

use std::path::{Path, PathBuf};

use airflow_reconcile_client::{AirflowClient, ProviderConfig};
use airflow_reconcile_core::resources::{Connection, Dag, Pool, Variable};
use airflow_reconcile_core::{Kind, Reconciler, Transport};
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use output::print_error;
use state::StateFile;

const DEFAULT_CONFIG: &str = "airflow-reconcile.toml";

/// Runs `$func::<K>(reconciler, $args...)` for the reconciler of `$kind`.
macro_rules! dispatch {
    ($kind:expr, $transport:expr, $cancel:expr, $func:path, $($arg:expr),*) => {
        match $kind {
            Kind::Connection => {
                let r = Reconciler::<Connection>::new($transport).with_cancellation($cancel);
                $func(&r, $($arg),*).await
            }
            Kind::Dag => {
                let r = Reconciler::<Dag>::new($transport).with_cancellation($cancel);
                $func(&r, $($arg),*).await
            }
            Kind::Pool => {
                let r = Reconciler::<Pool>::new($transport).with_cancellation($cancel);
                $func(&r, $($arg),*).await
            }
            Kind::Variable => {
                let r = Reconciler::<Variable>::new($transport).with_cancellation($cancel);
                $func(&r, $($arg),*).await
            }
        }
    };
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    observability::init_tracing(&config.log_level);

    let client = AirflowClient::connect(&config)
        .await
        .context("Failed to set up the Airflow client")?;
    let transport: &dyn Transport = &client;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let mut state = StateFile::load(&cli.state)?;
    match &cli.command {
        Commands::Apply(args) => dispatch!(
            args.kind,
            transport,
            cancel,
            commands::apply,
            &mut state,
            &args.file
        ),
        Commands::Read(args) => dispatch!(
            args.kind,
            transport,
            cancel,
            commands::read,
            &mut state,
            &args.id
        ),
        Commands::Import(args) => dispatch!(
            args.kind,
            transport,
            cancel,
            commands::import,
            &mut state,
            &args.id
        ),
        Commands::Delete(args) => dispatch!(
            args.kind,
            transport,
            cancel,
            commands::delete,
            &mut state,
            &args.id
        ),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ProviderConfig> {
    let default_path = PathBuf::from(DEFAULT_CONFIG);
    let path = match explicit {
        Some(p) => Some(p),
        None if default_path.exists() => Some(default_path.as_path()),
        None => None,
    };
    ProviderConfig::load(path).context("Failed to load provider configuration")
}
