//! Organization directory cache.
//!
//! Read-mostly lookup of organizations by id, used when rendering invitation
//! details ("you are invited to join Acme Corp as employee"). The cache is an
//! explicit object owned by `AppState` and passed by reference; entries MUST
//! be invalidated after any organization mutation; the organization handlers
//! call `invalidate` after every write.

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::Organization;
use crate::services::Database;

#[derive(Default)]
pub struct OrgDirectory {
    entries: DashMap<Uuid, Organization>,
}

impl OrgDirectory {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Cached entry, if present.
    pub fn cached(&self, organization_id: Uuid) -> Option<Organization> {
        self.entries.get(&organization_id).map(|e| e.value().clone())
    }

    /// Insert or replace an entry.
    pub fn store(&self, org: Organization) {
        self.entries.insert(org.organization_id, org);
    }

    /// Drop an entry. Called after any mutation of the organization.
    pub fn invalidate(&self, organization_id: Uuid) {
        self.entries.remove(&organization_id);
    }

    /// Cache-through lookup.
    pub async fn get_or_load(
        &self,
        db: &Database,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, sqlx::Error> {
        if let Some(org) = self.cached(organization_id) {
            return Ok(Some(org));
        }

        let org = db.find_organization_by_id(organization_id).await?;
        if let Some(org) = &org {
            self.store(org.clone());
        }
        Ok(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(name: &str) -> Organization {
        Organization::new(name.to_string())
    }

    #[test]
    fn store_then_cached_returns_the_entry() {
        let directory = OrgDirectory::new();
        let acme = org("Acme Corp");
        let id = acme.organization_id;

        assert!(directory.cached(id).is_none());
        directory.store(acme);
        assert_eq!(directory.cached(id).unwrap().org_name, "Acme Corp");
    }

    #[test]
    fn invalidate_drops_the_entry() {
        let directory = OrgDirectory::new();
        let acme = org("Acme Corp");
        let id = acme.organization_id;

        directory.store(acme);
        directory.invalidate(id);
        assert!(directory.cached(id).is_none());
    }

    #[test]
    fn store_replaces_stale_entries() {
        let directory = OrgDirectory::new();
        let mut acme = org("Acme Corp");
        let id = acme.organization_id;

        directory.store(acme.clone());
        acme.org_name = "Acme Inc".to_string();
        directory.store(acme);
        assert_eq!(directory.cached(id).unwrap().org_name, "Acme Inc");
    }
}
