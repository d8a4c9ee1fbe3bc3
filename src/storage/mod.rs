use crate::chrome;
use crate::config::PanelConfig;
use crate::error::StoreError;
use crate::models::{FrameNavState, Note, NoteId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Storage area name in `chrome.storage.onChanged` events.
pub const SYNC_AREA: &str = "sync";

/// Minimal string key-value area (`chrome.storage.sync` or in-memory).
pub trait StorageArea {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct SyncCache {
    items: BTreeMap<String, String>,
    /// Set when the initial read failed; reads report it instead of "empty".
    read_error: Option<String>,
}

/// `chrome.storage.sync` behind a write-through cache.
///
/// The browser area is asynchronous: [`ChromeSyncStorage::hydrate`] fills the
/// cache once, reads are served from it, and writes update it before going
/// out without waiting. Clones share the cache, so the change listener can
/// keep it current with [`ChromeSyncStorage::absorb`].
#[derive(Clone, Debug, Default)]
pub struct ChromeSyncStorage {
    cache: Rc<RefCell<SyncCache>>,
}

impl ChromeSyncStorage {
    /// Read `keys` from the synced area. Never fails: a failed read yields a
    /// storage whose reads return the error, so nothing overwrites the area.
    pub async fn hydrate(keys: &[&str]) -> Self {
        let storage = Self::default();
        match Self::fetch(keys).await {
            Ok(items) => storage.cache.borrow_mut().items = items,
            Err(e) => {
                tracing::warn!(error = ?e, "could not read synced storage");
                storage.cache.borrow_mut().read_error = Some(format!("{e:?}"));
            }
        }
        storage
    }

    async fn fetch(keys: &[&str]) -> Result<BTreeMap<String, String>, JsValue> {
        let wanted: js_sys::Array = keys.iter().map(|k| JsValue::from_str(k)).collect();
        let pending = chrome::call(&["chrome", "storage", "sync", "get"], &[wanted.into()])?;
        let found = JsFuture::from(js_sys::Promise::from(pending)).await?;

        let mut items = BTreeMap::new();
        for key in keys {
            let value = js_sys::Reflect::get(&found, &JsValue::from_str(key))?;
            if value.is_undefined() {
                continue;
            }
            if let Some(json) = js_sys::JSON::stringify(&value)?.as_string() {
                items.insert((*key).to_string(), json);
            }
        }
        Ok(items)
    }

    /// Record a value written by another context. Returns `false` when it is
    /// the value this context already holds (the echo of its own write).
    pub fn absorb(&self, key: &str, value: Option<&str>) -> bool {
        let mut cache = self.cache.borrow_mut();
        let current = cache.items.get(key).map(String::as_str);
        if current == value {
            return false;
        }
        match value {
            Some(v) => cache.items.insert(key.to_string(), v.to_string()),
            None => cache.items.remove(key),
        };
        // The area answered with real data, so it is readable again.
        cache.read_error = None;
        true
    }

    fn send(method: &str, arg: JsValue) -> Result<(), StoreError> {
        let pending = chrome::call(&["chrome", "storage", "sync", method], &[arg])
            .map_err(|_| StoreError::Unavailable)?;
        let method = method.to_string();
        chrome::on_rejection(&pending, move |e| {
            tracing::warn!(method, error = ?e, "synced storage write rejected");
        });
        Ok(())
    }
}

impl StorageArea for ChromeSyncStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let cache = self.cache.borrow();
        if let Some(e) = &cache.read_error {
            return Err(StoreError::Read(e.clone()));
        }
        Ok(cache.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let parsed = js_sys::JSON::parse(value).map_err(|e| StoreError::Write(format!("{e:?}")))?;
        let item = js_sys::Object::new();
        js_sys::Reflect::set(&item, &JsValue::from_str(key), &parsed)
            .map_err(|e| StoreError::Write(format!("{e:?}")))?;
        Self::send("set", item.into())?;
        self.cache
            .borrow_mut()
            .items
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        Self::send("remove", JsValue::from_str(key))?;
        self.cache.borrow_mut().items.remove(key);
        Ok(())
    }
}

/// In-memory area. Also records every write so tests can assert on persistence.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
    writes: usize,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set_item`/`remove_item` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read("simulated failure".to_string()));
        }
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write("simulated failure".to_string()));
        }
        self.items.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write("simulated failure".to_string()));
        }
        self.items.remove(key);
        self.writes += 1;
        Ok(())
    }
}

pub(crate) fn load_json<A: StorageArea, T: for<'de> Deserialize<'de>>(
    area: &A,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match area.get_item(key)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub(crate) fn save_json<A: StorageArea, T: Serialize>(
    area: &mut A,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    area.set_item(key, &json)
}

/// A stored collection split into the notes that decode and the records
/// that do not. The latter are written back verbatim so a save never drops them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedNotes {
    pub notes: Vec<Note>,
    pub unreadable: Vec<serde_json::Value>,
}

/// Decode a stored collection record by record. Fails only when the value
/// is not a JSON array at all.
pub fn decode_notes(json: &str) -> Result<DecodedNotes, StoreError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut decoded = DecodedNotes::default();
    for record in records {
        match Note::deserialize(&record) {
            Ok(note) => decoded.notes.push(note),
            Err(e) => {
                tracing::warn!(error = %e, "keeping unreadable note record as is");
                decoded.unreadable.push(record);
            }
        }
    }
    Ok(decoded)
}

/// Typed access to the note collection and frame navigation states.
///
/// Always writes the full collection; there is no delta persistence.
#[derive(Clone, Debug)]
pub struct NoteRepository<A> {
    area: A,
    notes_key: String,
    frame_states_key: String,
    /// Stored records that did not decode, appended on every save.
    unreadable: Vec<serde_json::Value>,
}

impl<A: StorageArea> NoteRepository<A> {
    pub fn new(area: A, config: &PanelConfig) -> Self {
        Self {
            area,
            notes_key: config.notes_key.clone(),
            frame_states_key: config.frame_states_key.clone(),
            unreadable: Vec::new(),
        }
    }

    pub fn notes_key(&self) -> &str {
        &self.notes_key
    }

    pub fn area(&self) -> &A {
        &self.area
    }

    pub fn area_mut(&mut self) -> &mut A {
        &mut self.area
    }

    pub fn unreadable(&self) -> &[serde_json::Value] {
        &self.unreadable
    }

    /// Replace the preserved records (after another page rewrote the collection).
    pub fn keep_unreadable(&mut self, records: Vec<serde_json::Value>) {
        self.unreadable = records;
    }

    /// Read without side effects. `Ok(None)` when nothing has been stored yet.
    pub fn read_notes(&self) -> Result<Option<DecodedNotes>, StoreError> {
        match self.area.get_item(&self.notes_key)? {
            Some(json) => Ok(Some(decode_notes(&json)?)),
            None => Ok(None),
        }
    }

    /// Read the collection and remember the records that did not decode.
    pub fn load_notes(&mut self) -> Result<Option<Vec<Note>>, StoreError> {
        let Some(decoded) = self.read_notes()? else {
            self.unreadable.clear();
            return Ok(None);
        };
        self.unreadable = decoded.unreadable;
        Ok(Some(decoded.notes))
    }

    pub fn save_notes(&mut self, notes: &[Note]) -> Result<(), StoreError> {
        if self.unreadable.is_empty() {
            return save_json(&mut self.area, &self.notes_key, &notes);
        }
        let mut records = notes
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        records.extend(self.unreadable.iter().cloned());
        save_json(&mut self.area, &self.notes_key, &records)
    }

    pub fn load_frame_states(&self) -> Result<BTreeMap<NoteId, FrameNavState>, StoreError> {
        Ok(load_json(&self.area, &self.frame_states_key)?.unwrap_or_default())
    }

    pub fn save_frame_states(
        &mut self,
        states: &BTreeMap<NoteId, FrameNavState>,
    ) -> Result<(), StoreError> {
        if states.is_empty() {
            return self.area.remove_item(&self.frame_states_key);
        }
        save_json(&mut self.area, &self.frame_states_key, states)
    }
}

/// A change to the note collection made by another extension context.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageChange {
    /// `None` when the key was removed.
    pub notes: Option<Vec<Note>>,
    /// Records of the new value that did not decode.
    pub unreadable: Vec<serde_json::Value>,
}

impl StorageChange {
    /// Decode one changed key. Other keys and values that are not a note
    /// array return `None`.
    pub fn from_parts(notes_key: &str, key: &str, new_value: Option<&str>) -> Option<Self> {
        if key != notes_key {
            return None;
        }
        let Some(json) = new_value else {
            return Some(Self {
                notes: None,
                unreadable: Vec::new(),
            });
        };
        match decode_notes(json) {
            Ok(decoded) => Some(Self {
                notes: Some(decoded.notes),
                unreadable: decoded.unreadable,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed external note change");
                None
            }
        }
    }

    /// Decode a `chrome.storage.onChanged` event. The new value is handed
    /// to `storage` first; echoes of this context's own writes return `None`.
    pub fn from_chrome_event(
        storage: &ChromeSyncStorage,
        notes_key: &str,
        changes: &JsValue,
        area_name: &str,
    ) -> Option<Self> {
        if area_name != SYNC_AREA {
            return None;
        }
        let change = js_sys::Reflect::get(changes, &JsValue::from_str(notes_key)).ok()?;
        if change.is_undefined() {
            return None;
        }
        let new_value = js_sys::Reflect::get(&change, &JsValue::from_str("newValue"))
            .ok()
            .filter(|v| !v.is_undefined())
            .and_then(|v| js_sys::JSON::stringify(&v).ok())
            .and_then(|v| v.as_string());
        if !storage.absorb(notes_key, new_value.as_deref()) {
            return None;
        }
        Self::from_parts(notes_key, notes_key, new_value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repo() -> NoteRepository<MemoryStorage> {
        NoteRepository::new(MemoryStorage::new(), &PanelConfig::default())
    }

    #[test]
    fn test_notes_round_trip_under_configured_key() {
        let mut r = repo();
        assert_eq!(r.load_notes().expect("load"), None);

        let mut n = Note::new(NoteId::from("a"), 1);
        n.order = Some(0);
        r.save_notes(&[n.clone()]).expect("save");

        assert!(r.area().raw("stickyNotes").is_some());
        assert_eq!(r.load_notes().expect("load"), Some(vec![n]));
    }

    #[test]
    fn test_malformed_collection_is_a_serialization_error() {
        let mut r = repo();
        r.area_mut().set_item("stickyNotes", "{not json").expect("set");
        assert!(matches!(r.load_notes(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_empty_frame_state_map_removes_key() {
        let mut r = repo();
        let mut states = BTreeMap::new();
        states.insert(NoteId::from("a"), FrameNavState::default());
        r.save_frame_states(&states).expect("save");
        assert!(r.area().raw("frameStates").is_some());

        r.save_frame_states(&BTreeMap::new()).expect("save");
        assert!(r.area().raw("frameStates").is_none());
        assert!(r.load_frame_states().expect("load").is_empty());
    }

    #[test]
    fn test_numeric_legacy_ids_load_and_survive_a_save() {
        let mut r = repo();
        let seed = r#"[{"id":"a","content":"keep me","order":0},{"id":1712345678901,"content":"legacy","order":1}]"#;
        r.area_mut().set_item("stickyNotes", seed).expect("seed");

        let mut notes = r.load_notes().expect("load").expect("present");
        assert_eq!(
            notes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "1712345678901"]
        );

        notes.push(Note::new(NoteId::from("b"), 2));
        r.save_notes(&notes).expect("save");
        let again = r.load_notes().expect("load").expect("present");
        assert_eq!(again.len(), 3);
        assert!(r.unreadable().is_empty());
    }

    #[test]
    fn test_unreadable_records_are_written_back() {
        let mut r = repo();
        let seed = r#"[{"id":"a","content":"ok"},{"content":"no id"}]"#;
        r.area_mut().set_item("stickyNotes", seed).expect("seed");

        let notes = r.load_notes().expect("load").expect("present");
        assert_eq!(notes.len(), 1);
        assert_eq!(r.unreadable().len(), 1);

        r.save_notes(&notes).expect("save");
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(r.area().raw("stickyNotes").expect("raw")).expect("json");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1], serde_json::json!({"content": "no id"}));
    }

    #[test]
    fn test_storage_change_filters_by_key() {
        assert_eq!(
            StorageChange::from_parts("stickyNotes", "other", Some("[]")),
            None
        );
        assert_eq!(
            StorageChange::from_parts("stickyNotes", "stickyNotes", Some("[]")),
            Some(StorageChange {
                notes: Some(vec![]),
                unreadable: vec![],
            })
        );
        assert_eq!(
            StorageChange::from_parts("stickyNotes", "stickyNotes", None),
            Some(StorageChange {
                notes: None,
                unreadable: vec![],
            })
        );
        assert_eq!(
            StorageChange::from_parts("stickyNotes", "stickyNotes", Some("oops")),
            None
        );
    }

    #[test]
    fn test_sync_cache_ignores_echo_of_own_value() {
        let storage = ChromeSyncStorage::default();
        assert!(storage.absorb("stickyNotes", Some("[]")));
        assert!(!storage.absorb("stickyNotes", Some("[]")));
        assert_eq!(storage.get_item("stickyNotes").expect("read"), Some("[]".to_string()));

        assert!(storage.absorb("stickyNotes", None));
        assert_eq!(storage.get_item("stickyNotes").expect("read"), None);
    }
}
