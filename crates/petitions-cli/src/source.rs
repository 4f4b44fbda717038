//! # Data Source
//!
//! Where petitions live for one CLI invocation: a JSON snapshot file loaded
//! into a [`MemoryStore`] and written back afterwards, or PostgreSQL.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use petitions_state::Petition;
use petitions_store::MemoryStore;

/// Selected data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Snapshot(PathBuf),
    Database(String),
}

impl Source {
    /// Pick the source from the command line. A snapshot path wins over a
    /// database URL, which may come from the environment.
    pub fn resolve(snapshot: Option<PathBuf>, database_url: Option<String>) -> Result<Self> {
        match (snapshot, database_url) {
            (Some(path), _) => Ok(Self::Snapshot(path)),
            (None, Some(url)) => Ok(Self::Database(url)),
            (None, None) => bail!("no data source: pass --snapshot or set DATABASE_URL"),
        }
    }
}

/// Load a snapshot. A missing file is an empty store.
pub fn load_snapshot(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "snapshot not found, starting empty");
        return Ok(MemoryStore::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let petitions: Vec<Petition> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), petitions = petitions.len(), "snapshot loaded");
    Ok(MemoryStore::load(petitions))
}

/// Write the store back to `path`, replacing it atomically.
pub fn save_snapshot(path: &Path, store: &MemoryStore) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let json = serde_json::to_string_pretty(&store.snapshot())?;
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    std::io::Write::write_all(&mut file, json.as_bytes())?;
    file.persist(path)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), petitions = store.len(), "snapshot saved");
    Ok(())
}
