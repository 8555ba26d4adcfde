//! Project registry
//!
//! The effective registry is the built-in default sequence minus tombstoned
//! ids, followed by user-created projects in insertion order. Defaults are
//! never written to storage; removing one only records a tombstone.

use std::collections::BTreeSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::model::{ProjectConfig, ProjectId};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the JSON array of custom projects
pub const CUSTOM_PROJECTS_KEY: &str = "devdeck.customProjects";
/// Storage key holding the JSON array of hidden default ids
pub const REMOVED_DEFAULTS_KEY: &str = "devdeck.removedDefaults";

pub struct RegistryStore<S> {
    store: S,
    defaults: Vec<ProjectConfig>,
}

impl<S: KeyValueStore> RegistryStore<S> {
    pub fn new(store: S, defaults: Vec<ProjectConfig>) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &[ProjectConfig] {
        &self.defaults
    }

    pub fn is_default(&self, id: &str) -> bool {
        self.defaults.iter().any(|p| p.id == id)
    }

    /// Effective registry: visible defaults, then custom projects.
    pub fn get_projects(&self) -> Vec<ProjectConfig> {
        let removed = self.removed_default_ids();
        let mut projects: Vec<ProjectConfig> = self
            .defaults
            .iter()
            .filter(|p| !removed.contains(&p.id))
            .cloned()
            .collect();
        projects.extend(self.custom_projects());
        projects
    }

    /// Append a custom project. Id collisions are not checked here.
    pub fn add_project(&mut self, project: ProjectConfig) -> Result<(), StorageError> {
        let mut custom = self.custom_projects();
        debug!(id = %project.id, "adding project");
        custom.push(project);
        self.write(CUSTOM_PROJECTS_KEY, &custom)
    }

    /// Hide a default (tombstone) or delete a custom project.
    ///
    /// Removing an unknown custom id leaves storage untouched.
    pub fn remove_project(&mut self, id: &str) -> Result<(), StorageError> {
        if self.is_default(id) {
            let mut removed = self.removed_default_ids();
            if removed.insert(id.to_string()) {
                debug!(id, "hiding default project");
                self.write(REMOVED_DEFAULTS_KEY, &removed)?;
            }
            return Ok(());
        }

        let custom = self.custom_projects();
        let before = custom.len();
        let kept: Vec<ProjectConfig> = custom.into_iter().filter(|p| p.id != id).collect();
        if kept.len() == before {
            debug!(id, "remove: no such custom project");
            return Ok(());
        }
        debug!(id, "deleting custom project");
        self.write(CUSTOM_PROJECTS_KEY, &kept)
    }

    /// Clear the tombstone for `id`, whether or not it was set.
    pub fn restore_default_project(&mut self, id: &str) -> Result<(), StorageError> {
        let mut removed = self.removed_default_ids();
        removed.remove(id);
        debug!(id, "restoring default project");
        self.write(REMOVED_DEFAULTS_KEY, &removed)
    }

    pub fn removed_default_ids(&self) -> BTreeSet<ProjectId> {
        self.read(REMOVED_DEFAULTS_KEY).unwrap_or_default()
    }

    fn custom_projects(&self) -> Vec<ProjectConfig> {
        self.read(CUSTOM_PROJECTS_KEY).unwrap_or_default()
    }

    /// Absent or unparseable values read as `None`.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt stored value");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample;
    use crate::storage::MemoryStore;

    fn registry_with_defaults() -> RegistryStore<MemoryStore> {
        RegistryStore::new(
            MemoryStore::new(),
            vec![sample("alpha", 5173, 8000), sample("beta", 5174, 8001)],
        )
    }

    fn ids(projects: &[ProjectConfig]) -> Vec<&str> {
        projects.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_empty_store_shows_defaults() {
        let reg = registry_with_defaults();
        assert_eq!(ids(&reg.get_projects()), vec!["alpha", "beta"]);
        assert!(reg.removed_default_ids().is_empty());
    }

    #[test]
    fn test_custom_projects_follow_defaults_in_insertion_order() {
        let mut reg = registry_with_defaults();
        reg.add_project(sample("zeta", 5175, 8002)).unwrap();
        reg.add_project(sample("gamma", 5176, 8003)).unwrap();
        reg.add_project(sample("delta", 5177, 8004)).unwrap();

        assert_eq!(
            ids(&reg.get_projects()),
            vec!["alpha", "beta", "zeta", "gamma", "delta"]
        );
    }

    #[test]
    fn test_add_does_not_touch_defaults() {
        let mut reg = registry_with_defaults();
        reg.add_project(sample("alpha", 6000, 9000)).unwrap();

        assert_eq!(reg.defaults()[0].frontend.port, 5173);
        // Collisions are not checked by the store
        assert_eq!(ids(&reg.get_projects()), vec!["alpha", "beta", "alpha"]);
    }

    #[test]
    fn test_remove_default_is_idempotent_tombstone() {
        let mut reg = registry_with_defaults();
        reg.remove_project("alpha").unwrap();
        let once = reg.store.get(REMOVED_DEFAULTS_KEY);
        reg.remove_project("alpha").unwrap();
        let twice = reg.store.get(REMOVED_DEFAULTS_KEY);

        assert_eq!(once, twice);
        assert_eq!(reg.removed_default_ids().len(), 1);
        assert_eq!(ids(&reg.get_projects()), vec!["beta"]);
        assert!(reg.is_default("alpha"));
        assert_eq!(reg.defaults().len(), 2);
    }

    #[test]
    fn test_restore_returns_default_to_builtin_position() {
        let mut reg = registry_with_defaults();
        reg.add_project(sample("custom", 5180, 8010)).unwrap();
        reg.remove_project("alpha").unwrap();
        reg.restore_default_project("alpha").unwrap();

        let projects = reg.get_projects();
        assert_eq!(ids(&projects), vec!["alpha", "beta", "custom"]);
        assert_eq!(projects[0], sample("alpha", 5173, 8000));
    }

    #[test]
    fn test_restore_when_not_removed() {
        let mut reg = registry_with_defaults();
        reg.restore_default_project("beta").unwrap();
        reg.restore_default_project("unknown").unwrap();
        assert_eq!(ids(&reg.get_projects()), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_remove_custom_deletes() {
        let mut reg = registry_with_defaults();
        reg.add_project(sample("one", 5180, 8010)).unwrap();
        reg.add_project(sample("two", 5181, 8011)).unwrap();
        reg.remove_project("one").unwrap();

        assert_eq!(ids(&reg.get_projects()), vec!["alpha", "beta", "two"]);
        assert!(reg.removed_default_ids().is_empty());
    }

    #[test]
    fn test_remove_missing_custom_is_noop() {
        let mut reg = registry_with_defaults();
        reg.add_project(sample("one", 5180, 8010)).unwrap();
        let before_custom = reg.store.get(CUSTOM_PROJECTS_KEY);
        let before_removed = reg.store.get(REMOVED_DEFAULTS_KEY);

        reg.remove_project("nope").unwrap();

        assert_eq!(reg.store.get(CUSTOM_PROJECTS_KEY), before_custom);
        assert_eq!(reg.store.get(REMOVED_DEFAULTS_KEY), before_removed);
    }

    #[test]
    fn test_corrupt_custom_key_falls_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(CUSTOM_PROJECTS_KEY, "[{broken".into()).unwrap();
        store
            .set(REMOVED_DEFAULTS_KEY, r#"["beta"]"#.into())
            .unwrap();
        let reg = RegistryStore::new(
            store,
            vec![sample("alpha", 5173, 8000), sample("beta", 5174, 8001)],
        );

        assert_eq!(ids(&reg.get_projects()), vec!["alpha"]);
    }

    #[test]
    fn test_corrupt_tombstone_key_shows_all_defaults() {
        let mut store = MemoryStore::new();
        store.set(REMOVED_DEFAULTS_KEY, "not json".into()).unwrap();
        let mut reg = RegistryStore::new(store, vec![sample("alpha", 5173, 8000)]);
        reg.add_project(sample("mine", 5174, 8001)).unwrap();

        assert_eq!(ids(&reg.get_projects()), vec!["alpha", "mine"]);
        assert!(reg.removed_default_ids().is_empty());
    }

    #[test]
    fn test_add_after_corruption_starts_fresh_list() {
        let mut store = MemoryStore::new();
        store.set(CUSTOM_PROJECTS_KEY, "{}".into()).unwrap();
        let mut reg = RegistryStore::new(store, Vec::new());
        reg.add_project(sample("fresh", 5173, 8000)).unwrap();

        assert_eq!(ids(&reg.get_projects()), vec!["fresh"]);
    }
}
