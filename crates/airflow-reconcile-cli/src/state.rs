//! Local state file: last-known observed state per managed resource.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use airflow_reconcile_core::Kind;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct StateFile {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

fn key(kind: Kind, id: &str) -> String {
    format!("{kind}/{id}")
}

impl StateFile {
    /// A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid state file: {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> Result<Option<T>> {
        self.entries
            .get(&key(kind, id))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .with_context(|| format!("Corrupt state entry for {kind} `{id}`"))
    }

    pub fn put<T: Serialize>(&mut self, kind: Kind, id: &str, observed: &T) -> Result<()> {
        let value = serde_json::to_value(observed)?;
        self.entries.insert(key(kind, id), value);
        Ok(())
    }

    pub fn remove(&mut self, kind: Kind, id: &str) -> bool {
        self.entries.remove(&key(kind, id)).is_some()
    }

    /// Writes to a sibling temp file, then renames over the target.
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airflow_reconcile_core::resources::PoolState;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("state.json")).unwrap();
        assert!(state.get::<PoolState>(Kind::Pool, "p").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let observed = PoolState {
            name: "p".into(),
            slots: 3,
            open_slots: 3,
            ..PoolState::default()
        };

        let mut state = StateFile::load(&path).unwrap();
        state.put(Kind::Pool, "p", &observed).unwrap();
        state.save().unwrap();

        let mut reloaded = StateFile::load(&path).unwrap();
        assert_eq!(reloaded.get::<PoolState>(Kind::Pool, "p").unwrap(), Some(observed));
        assert!(reloaded.get::<PoolState>(Kind::Variable, "p").unwrap().is_none());

        assert!(reloaded.remove(Kind::Pool, "p"));
        reloaded.save().unwrap();
        let emptied = StateFile::load(&path).unwrap();
        assert!(emptied.get::<PoolState>(Kind::Pool, "p").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        assert!(StateFile::load(&path).is_err());
    }
}
