//! Project repository seam.
//!
//! The backing store is an explicit, injectable trait: the business rules
//! in [`crate::ledger`] never see where projects live, and a durable
//! backend can be swapped in without touching them.

mod in_memory;
mod json_file;

pub use self::{in_memory::*, json_file::*};

use std::sync::Arc;

use anyhow::Result;

use crate::ledger::{Project, ProjectId, ProjectIdRef};

pub trait ProjectStore {
    fn get(&self, id: ProjectIdRef) -> Result<Option<Project>>;
    fn list(&self) -> Result<Vec<Project>>;
    fn insert(&self, project: Project) -> Result<()>;
    fn remove(&self, id: ProjectIdRef) -> Result<Option<Project>>;

    /// Atomic read-modify-write under the store's lock. Returns `false`
    /// when the project no longer exists.
    fn update(&self, id: ProjectIdRef, f: &mut dyn FnMut(&mut Project)) -> Result<bool>;

    /// Supplier authentication is a linear scan over every project's
    /// access codes; an identity is only valid while its project exists.
    fn find_supplier(&self, supplier: &str, code: &str) -> Result<Option<ProjectId>>;

    /// Persist pending changes, where the backend has a notion of that.
    fn flush(&self) -> Result<()>;
}

pub type SharedProjectStore = Arc<dyn ProjectStore + Send + Sync + 'static>;
