//! Device-local list storage.
//!
//! Every list this device knows about lives in one JSON document under a
//! single storage key (`<data_dir>/<key>.json`). Each mutation re-reads the
//! document, applies the change and replaces the whole file: no partial
//! writes and no transaction log. A document that cannot be read or parsed
//! is treated as empty.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use fandian_shared::{RestaurantDraft, RestaurantList, RestaurantPatch, DEFAULT_LIST_NAME};

use crate::ids;

pub struct LocalStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles between the sync loop and callers.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn open(data_dir: &Path, storage_key: &str) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join(format!("{storage_key}.json")),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All lists in insertion order. Missing or corrupt data yields an empty collection.
    pub fn get_all(&self) -> Vec<RestaurantList> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("Could not read local lists, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(lists) => lists,
            Err(e) => {
                tracing::warn!("Local lists corrupt, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    pub fn get(&self, list_id: &str) -> Option<RestaurantList> {
        self.get_all().into_iter().find(|l| l.id == list_id)
    }

    /// Replace the stored collection with `lists`.
    pub fn save(&self, lists: &[RestaurantList]) -> Result<()> {
        let contents = serde_json::to_string(lists)
            .context("Failed to serialize lists")?;

        // Write beside the target and rename so readers never see half a document
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .context("Failed to write lists file")?;
        fs::rename(&tmp, &self.path)
            .context("Failed to replace lists file")?;
        Ok(())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<RestaurantList>) -> Result<(T, bool)>,
    ) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        let mut lists = self.get_all();
        let (out, dirty) = f(&mut lists)?;
        if dirty {
            self.save(&lists)?;
        }
        Ok(out)
    }

    /// Create an empty list with a fresh id and share code. A blank name
    /// gets the default one.
    pub fn create(&self, name: &str) -> Result<RestaurantList> {
        let name = match name.trim() {
            "" => DEFAULT_LIST_NAME,
            trimmed => trimmed,
        };
        let list = RestaurantList::new(ids::new_id(), name, Some(ids::share_code()), Utc::now());
        self.modify(|lists| {
            lists.push(list.clone());
            Ok((list, true))
        })
    }

    /// Append a restaurant to a list. Does nothing if the list is missing.
    ///
    /// A draft the sync server would reject (blank name, non-finite number)
    /// is refused here and nothing is written.
    pub fn add_restaurant(
        &self,
        list_id: &str,
        draft: RestaurantDraft,
    ) -> Result<Vec<RestaurantList>> {
        self.modify(|lists| {
            let dirty = match lists.iter_mut().find(|l| l.id == list_id) {
                Some(list) => {
                    let mut edited = list.clone();
                    edited
                        .restaurants
                        .push(draft.into_restaurant(ids::new_id(), Utc::now()));
                    edited.validate().context("Invalid restaurant")?;
                    *list = edited;
                    true
                }
                None => false,
            };
            Ok((lists.clone(), dirty))
        })
    }

    /// Merge `patch` onto a restaurant. Does nothing unless both list and restaurant exist.
    pub fn update(
        &self,
        list_id: &str,
        restaurant_id: &str,
        patch: RestaurantPatch,
    ) -> Result<Vec<RestaurantList>> {
        self.modify(|lists| {
            let Some(idx) = lists
                .iter()
                .position(|l| l.id == list_id && l.restaurant(restaurant_id).is_some())
            else {
                return Ok((lists.clone(), false));
            };
            let mut edited = lists[idx].clone();
            if let Some(restaurant) = edited.restaurant_mut(restaurant_id) {
                patch.apply(restaurant);
            }
            edited.validate().context("Invalid restaurant update")?;
            lists[idx] = edited;
            Ok((lists.clone(), true))
        })
    }

    pub fn delete(&self, list_id: &str, restaurant_id: &str) -> Result<Vec<RestaurantList>> {
        self.modify(|lists| {
            let dirty = match lists.iter_mut().find(|l| l.id == list_id) {
                Some(list) => {
                    let before = list.restaurants.len();
                    list.restaurants.retain(|r| r.id != restaurant_id);
                    list.restaurants.len() != before
                }
                None => false,
            };
            Ok((lists.clone(), dirty))
        })
    }

    pub fn delete_list(&self, list_id: &str) -> Result<Vec<RestaurantList>> {
        self.modify(|lists| {
            let before = lists.len();
            lists.retain(|l| l.id != list_id);
            let dirty = lists.len() != before;
            Ok((lists.clone(), dirty))
        })
    }

    /// Insert `list`, or replace the stored list with the same id in place.
    pub fn upsert_list(&self, list: RestaurantList) -> Result<()> {
        self.modify(|lists| {
            match lists.iter().position(|l| l.id == list.id) {
                Some(idx) => lists[idx] = list,
                None => lists.push(list),
            }
            Ok(((), true))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path(), "restaurant-lists").unwrap();
        (dir, store)
    }

    fn draft(name: &str, price: f64) -> RestaurantDraft {
        RestaurantDraft {
            avg_price: price,
            tags: vec!["dinner".to_string()],
            ..RestaurantDraft::new(name)
        }
    }

    #[test]
    fn test_empty_store() {
        let (_dir, store) = open_store();
        assert!(store.get_all().is_empty());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_create_assigns_id_and_share_code() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();

        assert_eq!(list.name, "Weekend");
        assert!(!list.id.is_empty());
        assert_eq!(list.share_code.as_ref().map(|c| c.len()), Some(6));
        assert_eq!(store.get_all(), vec![list]);
    }

    #[test]
    fn test_add_restaurant_appends_in_order() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();

        store.add_restaurant(&list.id, draft("First", 50.0)).unwrap();
        let lists = store.add_restaurant(&list.id, draft("Second", 80.0)).unwrap();

        let names: Vec<_> = lists[0].restaurants.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_ne!(lists[0].restaurants[0].id, lists[0].restaurants[1].id);
        assert_eq!(store.get_all(), lists);
    }

    #[test]
    fn test_add_to_missing_list_is_noop() {
        let (_dir, store) = open_store();
        store.create("Weekend").unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let lists = store.add_restaurant("nope", draft("Lost", 10.0)).unwrap();

        assert!(lists[0].restaurants.is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_update_merges_fields() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();
        let lists = store.add_restaurant(&list.id, draft("Cafe", 30.0)).unwrap();
        let rid = lists[0].restaurants[0].id.clone();

        store
            .update(&list.id, &rid, RestaurantPatch::excluded(true))
            .unwrap();

        let stored = store.get(&list.id).unwrap();
        let r = stored.restaurant(&rid).unwrap();
        assert!(r.excluded);
        assert_eq!(r.name, "Cafe");
        assert_eq!(r.avg_price, 30.0);
    }

    #[test]
    fn test_update_unknown_restaurant_is_noop() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();
        store.add_restaurant(&list.id, draft("Cafe", 30.0)).unwrap();
        let before = store.get_all();

        store
            .update(&list.id, "ghost", RestaurantPatch::excluded(true))
            .unwrap();
        store
            .update("ghost", "ghost", RestaurantPatch::excluded(true))
            .unwrap();

        assert_eq!(store.get_all(), before);
    }

    #[test]
    fn test_invalid_drafts_are_refused_without_writing() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        assert!(store.add_restaurant(&list.id, RestaurantDraft::new("  ")).is_err());
        assert!(store.add_restaurant(&list.id, draft("Cafe", f64::NAN)).is_err());

        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        assert!(store.get(&list.id).unwrap().validate().is_ok());
    }

    #[test]
    fn test_invalid_patch_leaves_restaurant_untouched() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();
        let lists = store.add_restaurant(&list.id, draft("Cafe", 30.0)).unwrap();
        let rid = lists[0].restaurants[0].id.clone();

        let patch = RestaurantPatch {
            name: Some(String::new()),
            avg_price: Some(f64::INFINITY),
            ..RestaurantPatch::default()
        };
        assert!(store.update(&list.id, &rid, patch).is_err());

        let r = store.get(&list.id).unwrap().restaurant(&rid).cloned().unwrap();
        assert_eq!(r.name, "Cafe");
        assert_eq!(r.avg_price, 30.0);
    }

    #[test]
    fn test_blank_list_name_gets_default() {
        let (_dir, store) = open_store();
        let list = store.create("   ").unwrap();
        assert_eq!(list.name, DEFAULT_LIST_NAME);
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_delete_restaurant_and_list() {
        let (_dir, store) = open_store();
        let keep = store.create("Keep").unwrap();
        let drop = store.create("Drop").unwrap();
        let lists = store.add_restaurant(&keep.id, draft("Cafe", 30.0)).unwrap();
        let rid = lists[0].restaurants[0].id.clone();

        let lists = store.delete(&keep.id, &rid).unwrap();
        assert!(lists[0].restaurants.is_empty());

        let lists = store.delete_list(&drop.id).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].id, keep.id);
    }

    #[test]
    fn test_save_of_get_all_is_byte_identical() {
        let (_dir, store) = open_store();
        let list = store.create("Weekend").unwrap();
        store.add_restaurant(&list.id, draft("Cafe", 30.0)).unwrap();
        store.add_restaurant(&list.id, draft("Bistro", 120.0)).unwrap();
        let before = fs::read(store.path()).unwrap();

        store.save(&store.get_all()).unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_corrupt_document_fails_open() {
        let (_dir, store) = open_store();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.get_all().is_empty());

        // The next write starts over from the empty collection
        store.create("Fresh").unwrap();
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let (_dir, store) = open_store();
        let first = store.create("First").unwrap();
        let second = store.create("Second").unwrap();

        let mut renamed = first.clone();
        renamed.name = "Renamed".to_string();
        store.upsert_list(renamed).unwrap();

        let lists = store.get_all();
        assert_eq!(lists[0].name, "Renamed");
        assert_eq!(lists[1].id, second.id);

        let foreign = RestaurantList::new("shared-1", "Shared", None, Utc::now());
        store.upsert_list(foreign).unwrap();
        assert_eq!(store.get_all().len(), 3);
    }
}
