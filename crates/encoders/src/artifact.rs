//! Finished output and where it goes.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_common::pad_part;

/// A finalized binary artifact produced by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,

    /// Frames contained in the artifact.
    pub frames: u64,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Name of split part `part` of an output called `base`.
pub fn part_file_name(base: &str, part: u32) -> String {
    format!("{base}-part-{}", pad_part(part))
}

/// Receives artifacts for persistence.
pub trait ArtifactSink {
    fn persist(&self, artifact: &Artifact, file_name: &str, mime_type: &str)
        -> RaytrackResult<()>;
}

/// Writes artifacts as files into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where an artifact named `file_name` is written.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl ArtifactSink for DirectorySink {
    fn persist(
        &self,
        artifact: &Artifact,
        file_name: &str,
        mime_type: &str,
    ) -> RaytrackResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            RaytrackError::persistence(format!(
                "Failed to create output directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(file_name);
        std::fs::write(&path, &artifact.bytes).map_err(|e| {
            RaytrackError::persistence(format!("Failed to write {}: {e}", path.display()))
        })?;

        tracing::info!(
            path = %path.display(),
            bytes = artifact.len(),
            frames = artifact.frames,
            mime_type,
            "Artifact written"
        );
        Ok(())
    }
}

/// An artifact retained by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub artifact: Artifact,
}

/// Keeps artifacts in memory, in the order they were persisted.
#[derive(Debug, Default)]
pub struct MemorySink {
    stored: RefCell<Vec<StoredArtifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<StoredArtifact> {
        self.stored.borrow().clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.stored
            .borrow()
            .iter()
            .map(|s| s.file_name.clone())
            .collect()
    }
}

impl ArtifactSink for MemorySink {
    fn persist(
        &self,
        artifact: &Artifact,
        file_name: &str,
        mime_type: &str,
    ) -> RaytrackResult<()> {
        self.stored.borrow_mut().push(StoredArtifact {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            artifact: artifact.clone(),
        });
        Ok(())
    }
}
