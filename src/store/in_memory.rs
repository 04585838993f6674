use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::ledger::{Project, ProjectId, ProjectIdRef};

use super::{ProjectStore, SharedProjectStore};

/// Process-lifetime store. The default backend, and the one unit tests
/// run against.
#[derive(Default)]
pub struct InMemoryStore {
    projects: RwLock<BTreeMap<ProjectId, Project>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedProjectStore {
        Arc::new(Self::new())
    }
}

impl ProjectStore for InMemoryStore {
    fn get(&self, id: ProjectIdRef) -> Result<Option<Project>> {
        Ok(self.projects.read().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Project>> {
        Ok(self.projects.read().values().cloned().collect())
    }

    fn insert(&self, project: Project) -> Result<()> {
        self.projects.write().insert(project.id.clone(), project);
        Ok(())
    }

    fn remove(&self, id: ProjectIdRef) -> Result<Option<Project>> {
        Ok(self.projects.write().remove(id))
    }

    fn update(&self, id: ProjectIdRef, f: &mut dyn FnMut(&mut Project)) -> Result<bool> {
        let mut projects = self.projects.write();
        match projects.get_mut(id) {
            Some(project) => {
                f(project);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_supplier(&self, supplier: &str, code: &str) -> Result<Option<ProjectId>> {
        Ok(self
            .projects
            .read()
            .values()
            .find(|p| p.access_codes.get(supplier).map(String::as_str) == Some(code))
            .map(|p| p.id.clone()))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
