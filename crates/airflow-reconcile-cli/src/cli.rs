use std::path::PathBuf;

use airflow_reconcile_core::Kind;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "airflow-reconcile")]
#[command(about = "Converge Airflow connections, DAGs, pools and variables to a declared state")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Provider configuration file (TOML); AIRFLOW_* variables override it
    #[arg(short, long, global = true, env = "AIRFLOW_RECONCILE_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON file holding the last-known state of managed resources
    #[arg(
        short,
        long,
        global = true,
        env = "AIRFLOW_RECONCILE_STATE",
        default_value = "airflow-reconcile.state.json"
    )]
    pub state: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Converge a resource to the spec in a JSON file (or stdin)
    Apply(ApplyArgs),
    /// Refresh the recorded state of a managed resource
    Read(TargetArgs),
    /// Start managing an existing resource and print its spec
    Import(TargetArgs),
    /// Delete a resource and forget it
    Delete(TargetArgs),
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Resource kind: connection, dag, pool or variable
    pub kind: Kind,
    /// Spec file; reads stdin when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct TargetArgs {
    /// Resource kind: connection, dag, pool or variable
    pub kind: Kind,
    /// Identifier (connection_id, dag_id, pool name or variable key)
    pub id: String,
}
