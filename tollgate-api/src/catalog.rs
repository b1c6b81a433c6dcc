//! In-memory resource catalog behind the bundled routes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;

use crate::dto::{Resource, ResourceRequest};

/// Resource store that counts how often handlers read it.
#[derive(Debug)]
pub struct Catalog {
    resources: RwLock<BTreeMap<u64, Resource>>,
    next_id: AtomicU64,
    reads: AtomicU64,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            reads: AtomicU64::new(0),
        }
    }

    /// Lists every resource in ID order.
    pub fn list(&self) -> Vec<Resource> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.resources.read().values().cloned().collect()
    }

    /// Gets one resource.
    pub fn get(&self, id: u64) -> Option<Resource> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.resources.read().get(&id).cloned()
    }

    /// Inserts a new resource with the next free ID.
    pub fn create(&self, request: ResourceRequest) -> Resource {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let resource = build(id, request);
        self.resources.write().insert(id, resource.clone());
        resource
    }

    /// Creates or replaces the resource at `id`. Returns true if it was new.
    pub fn upsert(&self, id: u64, request: ResourceRequest) -> (Resource, bool) {
        let resource = build(id, request);
        let created = self
            .resources
            .write()
            .insert(id, resource.clone())
            .is_none();
        self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        (resource, created)
    }

    /// Removes a resource.
    pub fn remove(&self, id: u64) -> Option<Resource> {
        self.resources.write().remove(&id)
    }

    /// Number of handler reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn build(id: u64, request: ResourceRequest) -> Resource {
    Resource {
        id,
        name: request.name.trim().to_string(),
        description: request.description,
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> ResourceRequest {
        ResourceRequest {
            name: name.into(),
            description: None,
        }
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let catalog = Catalog::new();
        assert_eq!(catalog.create(request("a")).id, 1);
        assert_eq!(catalog.create(request("b")).id, 2);
        assert_eq!(catalog.list().len(), 2);
    }

    #[test]
    fn test_upsert_moves_next_id_past_explicit_ids() {
        let catalog = Catalog::new();
        let (_, created) = catalog.upsert(10, request("x"));
        assert!(created);
        assert_eq!(catalog.create(request("y")).id, 11);

        let (replaced, created) = catalog.upsert(10, request("z"));
        assert!(!created);
        assert_eq!(replaced.name, "z");
    }

    #[test]
    fn test_reads_are_counted() {
        let catalog = Catalog::new();
        catalog.create(request("a"));
        catalog.get(1);
        catalog.get(99);
        catalog.list();
        assert_eq!(catalog.reads(), 3);
    }
}
