// Transient local files produced while materializing a download

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::errors::Result;

/// Owns the directory that holds every request's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a fresh namespace for one request, creating the root on demand.
    pub async fn scope(&self) -> Result<RequestScope> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(RequestScope {
            id: Uuid::new_v4(),
            root: self.root.clone(),
        })
    }
}

/// Per-request namespace. Artifact names are `{id}-{role}`, so two requests
/// never touch the same file and no locking is needed.
#[derive(Debug, Clone)]
pub struct RequestScope {
    id: Uuid,
    root: PathBuf,
}

impl RequestScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Reserve a path for `role`. Nothing is created on disk yet, but the
    /// returned guard already owns the name.
    pub fn artifact(&self, role: &str) -> Artifact {
        Artifact {
            path: self.root.join(format!("{}-{}", self.id, role)),
            released: false,
        }
    }
}

/// A transient file with exactly one deletion.
///
/// Dropping the guard removes the file. A file that was never created is not
/// an error; any other removal failure is logged and swallowed.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    released: bool,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete now and report the outcome instead of logging it.
    pub fn delete(mut self) -> io::Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::trace!(path = %self.path.display(), "artifact deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to delete artifact");
        }
    }
}
