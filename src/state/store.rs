//! # Versioned shared state.
//!
//! [`StateStore`] holds the record given to `BusBuilder::init_with`. Every
//! write that actually changes something bumps the version by one and publishes
//! [`EventKind::StateChanged`](crate::EventKind::StateChanged) with the changed keys.
//!
//! ## Rules
//! - Version `0` is the initial state.
//! - Writes that leave the record unchanged publish nothing and keep the version.
//! - Changes are published while the write lock is held, so versions reach the
//!   hub in order.
//! - Reads return copies; no lock is held across `.await`.
//!
//! ```text
//! set / merge / append / remove / update
//!        │
//!        ▼
//!   RwLock<Record> ──► diff ──► version += 1 ──► Hub.publish(StateChanged)
//!                                          └──► watch::Sender<u64>
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::{StateError, json_type};
use crate::events::{Event, Hub};
use crate::state::StateChange;

struct Record {
    fields: Map<String, Value>,
    version: u64,
}

struct Shared {
    record: RwLock<Record>,
    hub: Hub,
    version_tx: watch::Sender<u64>,
}

/// Handle to the shared state; cheap to clone.
///
/// Handles obtained through a channel context tag their writes with the channel
/// name (see [`StateChange::source`]).
#[derive(Clone)]
pub struct StateStore {
    shared: Arc<Shared>,
    source: Option<Arc<str>>,
}

impl StateStore {
    /// Creates a store from an initial JSON object.
    pub(crate) fn new(initial: Value, hub: Hub) -> Result<Self, StateError> {
        let fields = match initial {
            Value::Object(map) => map,
            other => {
                return Err(StateError::NotAnObject {
                    found: json_type(&other),
                });
            }
        };
        let (version_tx, _rx) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                record: RwLock::new(Record { fields, version: 0 }),
                hub,
                version_tx,
            }),
            source: None,
        })
    }

    /// Same store, writes attributed to `source`.
    pub(crate) fn scoped(&self, source: Arc<str>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            source: Some(source),
        }
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.read(|r| r.version)
    }

    /// Copy of the whole record.
    pub fn snapshot(&self) -> Value {
        self.read(|r| Value::Object(r.fields.clone()))
    }

    /// Raw value of `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.read(|r| r.fields.get(key).cloned())
    }

    /// Reads and converts `key`; `Ok(None)` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        self.get_value(key)
            .map(|v| {
                serde_json::from_value(v).map_err(|source| StateError::Serde {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Sets `key` to `value`.
    pub fn set(&self, key: &str, value: impl Serialize) -> Result<Option<StateChange>, StateError> {
        let value = to_json(key, value)?;
        Ok(self.write(|fields| {
            if fields.get(key) == Some(&value) {
                return Vec::new();
            }
            fields.insert(key.to_string(), value);
            vec![key.to_string()]
        }))
    }

    /// Shallow merge: every key of `patch` replaces the stored one.
    pub fn merge(&self, patch: Value) -> Result<Option<StateChange>, StateError> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(StateError::NotAnObject {
                    found: json_type(&other),
                });
            }
        };
        Ok(self.write(|fields| {
            let mut changed = Vec::new();
            for (key, value) in patch {
                if fields.get(&key) != Some(&value) {
                    fields.insert(key.clone(), value);
                    changed.push(key);
                }
            }
            changed
        }))
    }

    /// Pushes `value` onto the array at `key`, creating it when absent.
    pub fn append(&self, key: &str, value: impl Serialize) -> Result<Option<StateChange>, StateError> {
        let value = to_json(key, value)?;
        let mut not_array = false;
        let change = self.write(|fields| {
            match fields
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => {
                    items.push(value);
                    vec![key.to_string()]
                }
                _ => {
                    not_array = true;
                    Vec::new()
                }
            }
        });
        if not_array {
            return Err(StateError::NotAnArray {
                key: key.to_string(),
            });
        }
        Ok(change)
    }

    /// Removes `key`; returns `None` when it was absent.
    pub fn remove(&self, key: &str) -> Option<StateChange> {
        self.write(|fields| match fields.remove(key) {
            Some(_) => vec![key.to_string()],
            None => Vec::new(),
        })
    }

    /// Arbitrary edit; changed keys are found by diffing before and after.
    pub fn update<F>(&self, edit: F) -> Option<StateChange>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        self.write(|fields| {
            let before = fields.clone();
            edit(fields);

            let mut changed: Vec<String> = fields
                .iter()
                .filter(|(k, v)| before.get(*k) != Some(*v))
                .map(|(k, _)| k.clone())
                .collect();
            changed.extend(before.keys().filter(|k| !fields.contains_key(*k)).cloned());
            changed
        })
    }

    /// Receiver that observes the latest version.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.shared.version_tx.subscribe()
    }

    fn read<R>(&self, f: impl FnOnce(&Record) -> R) -> R {
        let guard = self
            .shared
            .record
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Applies `edit` (which returns the changed keys) and publishes the change.
    fn write(&self, edit: impl FnOnce(&mut Map<String, Value>) -> Vec<String>) -> Option<StateChange> {
        let mut guard = self
            .shared
            .record
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut keys = edit(&mut guard.fields);
        if keys.is_empty() {
            return None;
        }
        keys.sort_unstable();
        keys.dedup();

        guard.version += 1;
        let version = guard.version;
        let change = StateChange {
            version,
            keys: keys.clone().into(),
            source: self.source.clone(),
        };
        self.shared
            .hub
            .publish(Event::state_changed(version, keys, self.source.as_deref()));
        self.shared.version_tx.send_replace(version);
        Some(change)
    }
}

fn to_json(key: &str, value: impl Serialize) -> Result<Value, StateError> {
    serde_json::to_value(value).map_err(|source| StateError::Serde {
        key: key.to_string(),
        source,
    })
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("version", &self.version())
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use serde_json::json;

    fn store() -> (StateStore, Hub) {
        let hub = Hub::new(64);
        let store = StateStore::new(json!({ "websocketConnected": false, "messages": [] }), hub.clone())
            .unwrap();
        (store, hub)
    }

    #[test]
    fn initial_state_must_be_an_object() {
        let err = StateStore::new(json!("nope"), Hub::new(1)).unwrap_err();
        assert!(matches!(err, StateError::NotAnObject { found: "string" }));
    }

    #[tokio::test]
    async fn set_bumps_version_and_publishes() {
        let (store, hub) = store();
        let mut rx = hub.subscribe();

        let change = store.set("websocketConnected", true).unwrap().unwrap();
        assert_eq!(change.version, 1);
        assert!(change.touches("websocketConnected"));
        assert_eq!(store.get::<bool>("websocketConnected").unwrap(), Some(true));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::StateChanged);
        assert_eq!(ev.version, Some(1));
        assert_eq!(ev.channel, None);
    }

    #[test]
    fn unchanged_writes_are_silent() {
        let (store, hub) = store();
        let mut rx = hub.subscribe();

        assert!(store.set("websocketConnected", false).unwrap().is_none());
        assert!(store.merge(json!({ "messages": [] })).unwrap().is_none());
        assert!(store.remove("missing").is_none());
        assert!(store.update(|_| {}).is_none());
        assert_eq!(store.version(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn merge_reports_only_changed_keys() {
        let (store, _hub) = store();
        let change = store
            .merge(json!({ "websocketConnected": false, "user": "ada", "room": 7 }))
            .unwrap()
            .unwrap();
        assert_eq!(&*change.keys, ["room".to_string(), "user".to_string()]);
        assert!(matches!(
            store.merge(json!([1])),
            Err(StateError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn append_pushes_and_creates_arrays() {
        let (store, _hub) = store();
        store.append("messages", json!({ "text": "hi" })).unwrap();
        store.append("messages", json!({ "text": "yo" })).unwrap();
        store.append("log", "first").unwrap();

        let messages: Vec<Value> = store.get("messages").unwrap().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(store.get_value("log"), Some(json!(["first"])));
        assert_eq!(store.version(), 3);

        let err = store.append("websocketConnected", 1).unwrap_err();
        assert!(matches!(err, StateError::NotAnArray { key } if key == "websocketConnected"));
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn update_diffs_added_changed_and_removed_keys() {
        let (store, _hub) = store();
        let change = store
            .update(|fields| {
                fields.remove("messages");
                fields.insert("websocketConnected".into(), json!(true));
                fields.insert("retries".into(), json!(2));
            })
            .unwrap();
        assert_eq!(
            &*change.keys,
            ["messages".to_string(), "retries".to_string(), "websocketConnected".to_string()]
        );
        assert_eq!(
            store.snapshot(),
            json!({ "websocketConnected": true, "retries": 2 })
        );
    }

    #[test]
    fn scoped_handles_tag_their_writes() {
        let (store, _hub) = store();
        let scoped = store.scoped(Arc::from("socket"));
        let change = scoped.set("websocketConnected", true).unwrap().unwrap();
        assert_eq!(change.source.as_deref(), Some("socket"));
        assert_eq!(store.get::<bool>("websocketConnected").unwrap(), Some(true));
    }

    #[tokio::test]
    async fn watch_sees_latest_version() {
        let (store, _hub) = store();
        let mut rx = store.watch();
        store.set("a", 1).unwrap();
        store.set("a", 2).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn typed_reads_report_bad_shapes() {
        let (store, _hub) = store();
        assert!(matches!(
            store.get::<u32>("websocketConnected"),
            Err(StateError::Serde { .. })
        ));
        assert_eq!(store.get::<u32>("absent").unwrap(), None);
    }
}
