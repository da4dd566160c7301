//! In-process object references for produced media.
//!
//! An [`ObjectRef`] is a short-lived `blob:<uuid>` handle that lets bytes be
//! served for playback or download without re-encoding them. References stay
//! live until revoked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const SCHEME: &str = "blob:";

/// Handle to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(String);

impl ObjectRef {
    fn generate() -> Self {
        Self(format!("{}{}", SCHEME, Uuid::new_v4()))
    }

    /// Parses either a full `blob:<id>` reference or a bare id.
    pub fn parse(value: &str) -> Option<Self> {
        let id = value.strip_prefix(SCHEME).unwrap_or(value);
        Uuid::parse_str(id).ok()?;
        Some(Self(format!("{}{}", SCHEME, id)))
    }

    /// The id part, usable in URLs.
    pub fn id(&self) -> &str {
        &self.0[SCHEME.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes behind an object reference.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Arc<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

/// Registry of live object references.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: RwLock<HashMap<ObjectRef, StoredObject>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` and returns a fresh reference to it.
    pub fn create(&self, data: Vec<u8>, content_type: impl Into<String>) -> ObjectRef {
        let object_ref = ObjectRef::generate();
        let object = StoredObject {
            content_type: content_type.into(),
            data: Arc::new(data),
            created_at: Utc::now(),
        };
        self.write().insert(object_ref.clone(), object);
        object_ref
    }

    /// Releases a reference. Returns whether it was live.
    pub fn revoke(&self, object_ref: &ObjectRef) -> bool {
        self.write().remove(object_ref).is_some()
    }

    pub fn get(&self, object_ref: &ObjectRef) -> Option<StoredObject> {
        self.read().get(object_ref).cloned()
    }

    /// Number of live references.
    pub fn live_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ObjectRef, StoredObject>> {
        match self.objects.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ObjectRef, StoredObject>> {
        match self.objects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
