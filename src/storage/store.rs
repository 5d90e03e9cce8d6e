use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Named whole-object storage. Writes replace the object; there is no append.
pub trait ArtifactStore: Send + Sync {
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    fn exists(&self, name: &str) -> bool;

    fn remove(&self, name: &str) -> Result<()>;
}

/// Filesystem container: one directory, objects addressed by relative name.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if name.is_empty() || escapes {
            return Err(PipelineError::Persistence(format!(
                "Invalid artifact name: '{}'",
                name
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        std::fs::read(&path).map_err(|e| {
            PipelineError::Persistence(format!("Cannot read artifact '{}': {}", name, e))
        })
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        // Stage in the same directory so the final rename replaces the object whole
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged.persist(&path).map_err(|e| {
            PipelineError::Persistence(format!("Cannot write artifact '{}': {}", name, e))
        })?;

        tracing::debug!(artifact = name, bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
