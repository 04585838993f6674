use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ledger::{Project, ProjectId, ProjectIdRef};

use super::{InMemoryStore, ProjectStore, SharedProjectStore};

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk document. Version 0 snapshots (written by the tool before it
/// had versioning) deserialize through the same path: the missing version
/// defaults to 0 and the lenient serde on [`Project`] fills field gaps,
/// so migration happens exactly once, here.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    projects: Vec<Project>,
}

/// Durable variant: the in-memory map plus a versioned JSON snapshot on
/// local disk. The snapshot is written to a sibling temp file and renamed
/// into place, so a crash mid-write cannot truncate the previous one.
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
    dirty: AtomicBool,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = InMemoryStore::new();
        match std::fs::read(&path) {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)
                    .with_context(|| format!("malformed snapshot {}", path.display()))?;
                if snapshot.version > SNAPSHOT_VERSION {
                    bail!(
                        "snapshot {} has version {}, newer than this binary understands",
                        path.display(),
                        snapshot.version
                    );
                }
                let count = snapshot.projects.len();
                for project in snapshot.projects {
                    inner.insert(project)?;
                }
                info!(path = %path.display(), count, "loaded snapshot");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no snapshot yet, starting empty");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading snapshot {}", path.display()))
            }
        }
        Ok(Self {
            path,
            inner,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn open_shared(path: impl Into<PathBuf>) -> Result<SharedProjectStore> {
        Ok(Arc::new(Self::open(path)?))
    }

    fn write_snapshot(&self) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            projects: self.inner.list()?,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("writing snapshot temp file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing snapshot {}", self.path.display()))?;
        debug!(path = %self.path.display(), bytes = json.len(), "snapshot written");
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

impl ProjectStore for JsonFileStore {
    fn get(&self, id: ProjectIdRef) -> Result<Option<Project>> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<Project>> {
        self.inner.list()
    }

    fn insert(&self, project: Project) -> Result<()> {
        self.inner.insert(project)?;
        self.mark_dirty();
        Ok(())
    }

    fn remove(&self, id: ProjectIdRef) -> Result<Option<Project>> {
        let removed = self.inner.remove(id)?;
        if removed.is_some() {
            self.mark_dirty();
        }
        Ok(removed)
    }

    fn update(&self, id: ProjectIdRef, f: &mut dyn FnMut(&mut Project)) -> Result<bool> {
        let updated = self.inner.update(id, f)?;
        if updated {
            self.mark_dirty();
        }
        Ok(updated)
    }

    fn find_supplier(&self, supplier: &str, code: &str) -> Result<Option<ProjectId>> {
        self.inner.find_supplier(supplier, code)
    }

    fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.write_snapshot() {
            // keep the data marked for the next flush attempt
            self.dirty.store(true, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }
}
