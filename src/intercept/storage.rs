use std::sync::{Arc, Weak};

use crate::event::{Event, EventSink, StorageAction, StorageEvent, StorageType};
use crate::host::{HostEnvironment, StorageArea, StoragePrototype};
use crate::Result;

use super::Interceptor;

/// Records web storage mutations
#[derive(Default)]
pub struct StorageInterceptor {
    original: Option<Arc<dyn StoragePrototype>>,
}

impl StorageInterceptor {
    /// Uninstalled interceptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

struct RecordingStorage {
    original: Arc<dyn StoragePrototype>,
    sink: EventSink,
    local: Weak<StorageArea>,
    session: Weak<StorageArea>,
}

impl RecordingStorage {
    /// Classify an area by identity against the host singletons
    fn storage_type(&self, area: &StorageArea) -> StorageType {
        if std::ptr::eq(area, self.local.as_ptr()) {
            StorageType::Local
        } else if std::ptr::eq(area, self.session.as_ptr()) {
            StorageType::Session
        } else {
            StorageType::Unknown
        }
    }

    fn record(&self, area: &StorageArea, action: StorageAction, key: Option<&str>, value: Option<String>) {
        let storage_type = self.storage_type(area);
        self.sink.record(|timestamp| {
            Event::Storage(StorageEvent {
                storage_type,
                action,
                key: key.map(str::to_string),
                value,
                timestamp,
            })
        });
    }
}

impl StoragePrototype for RecordingStorage {
    fn set_item(&self, area: &StorageArea, key: &str, value: &str) -> Result<()> {
        self.record(area, StorageAction::SetItem, Some(key), Some(self.sink.stringify(value)));
        self.original.set_item(area, key, value)
    }

    fn remove_item(&self, area: &StorageArea, key: &str) {
        self.record(area, StorageAction::RemoveItem, Some(key), None);
        self.original.remove_item(area, key);
    }

    fn clear(&self, area: &StorageArea) {
        self.record(area, StorageAction::Clear, None, None);
        self.original.clear(area);
    }
}

impl Interceptor for StorageInterceptor {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn install(&mut self, host: &HostEnvironment, sink: &EventSink) {
        if self.original.is_some() {
            return;
        }
        self.original = Some(host.storage_prototype().wrap(|original| {
            Arc::new(RecordingStorage {
                original,
                sink: sink.clone(),
                local: Arc::downgrade(host.local_storage()),
                session: Arc::downgrade(host.session_storage()),
            })
        }));
    }

    fn uninstall(&mut self, host: &HostEnvironment) {
        if let Some(original) = self.original.take() {
            host.storage_prototype().replace(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}
