use super::codec::{deserialize, serialize};
use super::model::PoseSequence;
use crate::config::StorageConfig;
use crate::error::{PosecoachError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const SEQUENCE_FILE_SUFFIX: &str = "_poses.json";

/// Directory of saved pose sequences
#[derive(Debug, Clone)]
pub struct SequenceStore {
    root: PathBuf,
}

impl SequenceStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a sequence with this name is saved under
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(file_name_for(name))
    }

    /// Write the sequence into the store, replacing any file of the same name
    pub async fn save(&self, sequence: &PoseSequence) -> Result<PathBuf> {
        let bytes = serialize(sequence)?;

        fs::create_dir_all(&self.root).await.map_err(|e| {
            PosecoachError::component(
                "sequence_store",
                &format!("Failed to create store directory: {}", e),
            )
        })?;

        let path = self.path_for(sequence.name());
        // Write beside the target and rename so readers never see a partial file
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, &bytes).await.map_err(|e| {
            PosecoachError::component(
                "sequence_store",
                &format!("Failed to write {}: {}", staging.display(), e),
            )
        })?;
        if let Err(e) = fs::rename(&staging, &path).await {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                debug!("Failed to remove {}: {}", staging.display(), cleanup);
            }
            return Err(e.into());
        }

        info!(
            "Saved sequence '{}' ({} poses) to {}",
            sequence.name(),
            sequence.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load a sequence saved under `name`
    pub async fn load(&self, name: &str) -> Result<PoseSequence> {
        load_file(self.path_for(name)).await
    }

    /// Saved sequence files, sorted by path
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_sequence = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(SEQUENCE_FILE_SUFFIX))
                .unwrap_or(false);
            if is_sequence {
                paths.push(path);
            }
        }
        paths.sort();

        debug!("Found {} sequences in {}", paths.len(), self.root.display());
        Ok(paths)
    }
}

/// Read and validate a sequence file from any location
pub async fn load_file<P: AsRef<Path>>(path: P) -> Result<PoseSequence> {
    let path = path.as_ref();
    let bytes = fs::read(path).await?;
    let sequence = deserialize(&bytes)?;

    debug!(
        "Loaded sequence '{}' ({} poses, {:.0} ms) from {}",
        sequence.name(),
        sequence.len(),
        sequence.duration_ms(),
        path.display()
    );
    Ok(sequence)
}

/// File name for a sequence.
///
/// Whitespace runs become underscores, as does any character outside
/// `[A-Za-z0-9._-]`, and leading dots are dropped, so the result is always
/// a plain file name inside the store directory.
pub fn file_name_for(name: &str) -> String {
    let stem: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_start_matches('.');
    let stem = if stem.is_empty() { "unnamed_sequence" } else { stem };
    format!("{}{}", stem, SEQUENCE_FILE_SUFFIX)
}
