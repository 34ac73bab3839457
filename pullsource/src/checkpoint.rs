//! Committed offset persisted as a single JSON file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pullsource_core::{CheckpointStore, Error, Offset, OffsetMap, Result};
use tracing::debug;

#[derive(Debug, Clone)]
pub(crate) struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub(crate) fn new(path: impl AsRef<Path>) -> Self {
        FileCheckpointStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Replaces the file atomically, by writing a tmp file next to it and renaming it.
    pub(crate) async fn write(&self, offset: &Offset) -> Result<()> {
        let value = serde_json::to_vec(offset)
            .map_err(|e| Error::Checkpoint(format!("Failed to encode offset {offset}: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, value).await.map_err(|e| {
            Error::Checkpoint(format!(
                "Failed to write checkpoint file {}: {e}",
                Path::new(&tmp).display()
            ))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Checkpoint(format!(
                "Failed to replace checkpoint file {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), %offset, "Checkpoint written");
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn read(&self) -> Result<Option<OffsetMap>> {
        let value = match tokio::fs::read(&self.path).await {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint file yet");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Checkpoint(format!(
                    "Failed to read checkpoint file {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&value).map(Some).map_err(|e| {
            Error::Checkpoint(format!(
                "Invalid checkpoint file {}: {e}",
                self.path.display()
            ))
        })
    }
}
