use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use airflow_reconcile_core::{Reconciler, ResourceKind};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::output::{print_json, print_success, print_warning};
use crate::state::StateFile;

fn read_spec<T: DeserializeOwned>(file: &Option<PathBuf>) -> Result<T> {
    let content = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read spec file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read spec from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Invalid spec JSON")
}

pub async fn apply<K>(
    reconciler: &Reconciler<'_, K>,
    state: &mut StateFile,
    file: &Option<PathBuf>,
) -> Result<()>
where
    K: ResourceKind,
    K::Spec: DeserializeOwned,
    K::Observed: Serialize + DeserializeOwned,
{
    let desired: K::Spec = read_spec(file)?;
    let id = K::spec_id(&desired).to_string();
    let prior: Option<K::Observed> = state.get(K::KIND, &id)?;

    let observed = reconciler.converge(&desired, prior.as_ref()).await?;
    state.put(K::KIND, &id, &observed)?;
    state.save()?;

    print_success(&format!("Applied {} {}", K::KIND.as_str().cyan(), id.cyan()));
    print_json(&observed)
}

pub async fn read<K>(reconciler: &Reconciler<'_, K>, state: &mut StateFile, id: &str) -> Result<()>
where
    K: ResourceKind,
    K::Observed: Serialize + DeserializeOwned,
{
    let prior: Option<K::Observed> = state.get(K::KIND, id)?;
    match reconciler.read(id, prior.as_ref()).await? {
        Some(observed) => {
            state.put(K::KIND, id, &observed)?;
            state.save()?;
            print_json(&observed)
        }
        None => {
            if state.remove(K::KIND, id) {
                state.save()?;
            }
            print_warning(&format!(
                "{} {} no longer exists; dropped from state",
                K::KIND.as_str().cyan(),
                id.cyan()
            ));
            Ok(())
        }
    }
}

pub async fn import<K>(
    reconciler: &Reconciler<'_, K>,
    state: &mut StateFile,
    id: &str,
) -> Result<()>
where
    K: ResourceKind,
    K::Spec: Serialize,
    K::Observed: Serialize + DeserializeOwned,
{
    let Some((spec, observed)) = reconciler.import(id).await? else {
        anyhow::bail!("{} `{id}` does not exist", K::KIND);
    };
    state.put(K::KIND, id, &observed)?;
    state.save()?;

    print_success(&format!("Imported {} {}", K::KIND.as_str().cyan(), id.cyan()));
    print_json(&spec)
}

pub async fn delete<K>(
    reconciler: &Reconciler<'_, K>,
    state: &mut StateFile,
    id: &str,
) -> Result<()>
where
    K: ResourceKind,
    K::Observed: Serialize + DeserializeOwned,
{
    let prior: Option<K::Observed> = state.get(K::KIND, id)?;
    reconciler.delete(id, prior.as_ref()).await?;
    state.remove(K::KIND, id);
    state.save()?;

    print_success(&format!("Deleted {} {}", K::KIND.as_str().cyan(), id.cyan()));
    Ok(())
}
