//! The on-disk revision store.
//!
//! An append-only directory of revision records, one `<id>.toml` file per
//! revision. The store reads and writes records; graph structure is
//! layered on top by [`crate::graph::RevisionGraph`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MigrateResult, MigrationError};
use crate::revision::Revision;

/// Length of generated revision ids.
const REVISION_ID_LEN: usize = 12;

/// Reader/writer for a directory of revision records.
#[derive(Debug, Clone)]
pub struct RevisionStore {
    script_dir: PathBuf,
}

impl RevisionStore {
    /// Create a store over the given script directory.
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
        }
    }

    /// The script directory.
    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Create the script directory if it does not exist.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.script_dir)
            .await
            .map_err(MigrationError::Io)?;
        Ok(())
    }

    /// Load every revision record in the directory.
    ///
    /// Records are returned sorted by id; ordering semantics beyond that
    /// belong to the graph.
    pub async fn load_all(&self) -> MigrateResult<Vec<Revision>> {
        let mut revisions = Vec::new();

        if !self.script_dir.exists() {
            return Ok(revisions);
        }

        let mut entries = tokio::fs::read_dir(&self.script_dir)
            .await
            .map_err(MigrationError::Io)?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(MigrationError::Io)? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let revision = self.read_record(&path).await?;
            revisions.push(revision);
        }

        debug!(count = revisions.len(), "loaded revision records");
        Ok(revisions)
    }

    /// Read one record, checking that its file name matches its id.
    async fn read_record(&self, path: &Path) -> MigrateResult<Revision> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(MigrationError::Io)?;

        let revision = Revision::from_toml(&content).map_err(|e| {
            MigrationError::invalid_revision(format!("{}: {}", path.display(), e))
        })?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem != revision.id {
            return Err(MigrationError::invalid_revision(format!(
                "record '{}' contains id '{}'",
                path.display(),
                revision.id
            )));
        }

        Ok(revision)
    }

    /// Persist a new revision record.
    ///
    /// The store is append-only: writing over an existing id is refused.
    pub async fn write(&self, revision: &Revision) -> MigrateResult<PathBuf> {
        self.ensure_dir().await?;

        let path = self.record_path(&revision.id);
        if path.exists() {
            return Err(MigrationError::invalid_revision(format!(
                "revision '{}' already exists at {}",
                revision.id,
                path.display()
            )));
        }

        let content = revision.to_toml()?;
        tokio::fs::write(&path, content)
            .await
            .map_err(MigrationError::Io)?;

        info!(id = %revision.id, path = %path.display(), "wrote revision record");
        Ok(path)
    }

    /// Path of the record for `id`.
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.script_dir.join(format!("{}.toml", id))
    }

    /// Generate a fresh revision id not present in `existing`.
    pub fn fresh_id(&self, existing: &HashSet<String>) -> String {
        loop {
            let id = generate_id();
            if !existing.contains(&id) && !self.record_path(&id).exists() {
                return id;
            }
        }
    }
}

/// Generate a short random revision id.
fn generate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..REVISION_ID_LEN].to_string()
}
