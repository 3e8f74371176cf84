//! Web storage capability
//!
//! `localStorage` and `sessionStorage` are two [`StorageArea`]s sharing one
//! swappable [`StoragePrototype`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::capability::Capability;
use crate::{Result, TapError};

/// Mutating storage methods shared by every area
pub trait StoragePrototype: Send + Sync {
    /// `setItem`
    ///
    /// # Errors
    ///
    /// Returns error if the area rejects the write
    fn set_item(&self, area: &StorageArea, key: &str, value: &str) -> Result<()>;
    /// `removeItem`
    fn remove_item(&self, area: &StorageArea, key: &str);
    /// `clear`
    fn clear(&self, area: &StorageArea);
}

/// Native behaviour: operate on the area's own entries
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeStorage;

impl StoragePrototype for NativeStorage {
    fn set_item(&self, area: &StorageArea, key: &str, value: &str) -> Result<()> {
        area.raw_insert(key, value)
    }

    fn remove_item(&self, area: &StorageArea, key: &str) {
        area.raw_remove(key);
    }

    fn clear(&self, area: &StorageArea) {
        area.raw_clear();
    }
}

/// One storage area
#[derive(Debug)]
pub struct StorageArea {
    label: String,
    prototype: Arc<Capability<dyn StoragePrototype>>,
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl StorageArea {
    /// Area dispatching mutations through `prototype`.
    ///
    /// `quota` bounds the summed byte length of keys and values.
    pub fn new(
        label: impl Into<String>,
        prototype: Arc<Capability<dyn StoragePrototype>>,
        quota: Option<usize>,
    ) -> Self {
        Self {
            label: label.into(),
            prototype,
            entries: Mutex::new(BTreeMap::new()),
            quota,
        }
    }

    /// Name used in diagnostics
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `getItem`
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// `setItem`, via the prototype
    ///
    /// # Errors
    ///
    /// Returns error if the write exceeds the quota
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.prototype.get().set_item(self, key, value)
    }

    /// `removeItem`, via the prototype
    pub fn remove_item(&self, key: &str) {
        self.prototype.get().remove_item(self, key);
    }

    /// `clear`, via the prototype
    pub fn clear(&self) {
        self.prototype.get().clear(self);
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the area is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write an entry, bypassing the prototype
    ///
    /// # Errors
    ///
    /// Returns error if the write exceeds the quota
    pub fn raw_insert(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > quota {
                return Err(TapError::Storage(format!(
                    "{}: quota exceeded ({needed} > {quota} bytes)",
                    self.label
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove an entry, bypassing the prototype
    pub fn raw_remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Remove all entries, bypassing the prototype
    pub fn raw_clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(quota: Option<usize>) -> StorageArea {
        let prototype: Arc<Capability<dyn StoragePrototype>> =
            Arc::new(Capability::new(Arc::new(NativeStorage)));
        StorageArea::new("localStorage", prototype, quota)
    }

    #[test]
    fn test_set_get_remove_clear() {
        let area = area(None);
        area.set_item("a", "1").unwrap();
        area.set_item("b", "2").unwrap();
        assert_eq!(area.get_item("a").as_deref(), Some("1"));

        area.remove_item("a");
        assert_eq!(area.get_item("a"), None);
        assert_eq!(area.len(), 1);

        area.clear();
        assert!(area.is_empty());
    }

    #[test]
    fn test_quota_exceeded() {
        let area = area(Some(8));
        area.set_item("k", "1234").unwrap();
        // overwriting the same key reuses its budget
        area.set_item("k", "1234567").unwrap();

        let err = area.set_item("other", "x").unwrap_err();
        assert!(matches!(err, TapError::Storage(_)));
        assert_eq!(area.get_item("other"), None);
    }
}
