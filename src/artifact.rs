use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::error::{LoopcardError, LoopcardResult};

/// Handle to a stored artifact, the local stand-in for an object URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    id: u64,
    location: PathBuf,
}

impl ArtifactHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Where the artifact can be opened (a file path for the file store).
    pub fn location(&self) -> &Path {
        &self.location
    }
}

/// Creates and revokes locally addressable handles for finished artifacts.
///
/// Revocation is exactly-once per handle: revoking an unknown or
/// already-revoked handle is reported as an error so leaks and double
/// frees both show up in tests.
pub trait ArtifactStore {
    fn create(&mut self, bytes: &[u8], ext: &str) -> LoopcardResult<ArtifactHandle>;
    fn revoke(&mut self, handle: &ArtifactHandle) -> LoopcardResult<()>;
}

/// File-backed store: each artifact becomes `card-<id>.<ext>` in a
/// directory; revoking deletes the file.
pub struct FileArtifactStore {
    dir: PathBuf,
    next_id: u64,
    live: BTreeMap<u64, PathBuf>,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> LoopcardResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            LoopcardError::validation(format!(
                "failed to create artifact directory '{}': {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            next_id: 1,
            live: BTreeMap::new(),
        })
    }
}

impl ArtifactStore for FileArtifactStore {
    fn create(&mut self, bytes: &[u8], ext: &str) -> LoopcardResult<ArtifactHandle> {
        let id = self.next_id;
        self.next_id += 1;
        let path = self.dir.join(format!("card-{id}.{ext}"));
        std::fs::write(&path, bytes).map_err(|e| {
            LoopcardError::validation(format!(
                "failed to write artifact '{}': {e}",
                path.display()
            ))
        })?;
        self.live.insert(id, path.clone());
        tracing::debug!(id, bytes = bytes.len(), path = %path.display(), "artifact created");
        Ok(ArtifactHandle { id, location: path })
    }

    fn revoke(&mut self, handle: &ArtifactHandle) -> LoopcardResult<()> {
        let Some(path) = self.live.remove(&handle.id) else {
            return Err(LoopcardError::validation(format!(
                "artifact {} is not live (already revoked?)",
                handle.id
            )));
        };
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(id = handle.id, path = %path.display(), "failed to remove artifact file: {e}");
        }
        tracing::debug!(id = handle.id, "artifact revoked");
        Ok(())
    }
}

/// In-memory store for tests: keeps created payloads and counts revokes.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    next_id: u64,
    pub created: Vec<(u64, Vec<u8>, String)>,
    pub live: Vec<u64>,
    pub revoked: Vec<u64>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn payload(&self, id: u64) -> Option<&[u8]> {
        self.created
            .iter()
            .find(|(got, _, _)| *got == id)
            .map(|(_, bytes, _)| bytes.as_slice())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn create(&mut self, bytes: &[u8], ext: &str) -> LoopcardResult<ArtifactHandle> {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.created.push((id, bytes.to_vec(), ext.to_string()));
        self.live.push(id);
        Ok(ArtifactHandle {
            id,
            location: PathBuf::from(format!("mem:{id}")),
        })
    }

    fn revoke(&mut self, handle: &ArtifactHandle) -> LoopcardResult<()> {
        let Some(pos) = self.live.iter().position(|&id| id == handle.id) else {
            return Err(LoopcardError::validation(format!(
                "artifact {} is not live (already revoked?)",
                handle.id
            )));
        };
        self.live.remove(pos);
        self.revoked.push(handle.id);
        Ok(())
    }
}
