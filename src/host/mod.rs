//! Host capability provider
//!
//! Everything the interceptors patch lives in a [`HostEnvironment`] built by
//! the embedding host. Each patchable API sits in a [`Capability`] slot, so
//! wrapping and restoring never touches process-wide state.

pub mod capability;
pub mod client;
pub mod console;
pub mod fetch;
pub mod indexed_db;
pub mod storage;
pub mod xhr;

use std::sync::Arc;

pub use capability::Capability;
pub use client::HttpFetch;
pub use console::{Console, ConsoleMethod, TracingConsoleMethod};
pub use fetch::{Body, FetchApi, FetchInput, FetchOptions, FetchResponse, Headers, HttpRequest};
pub use indexed_db::{
    IdbDatabase, IdbFactory, IdbObjectStore, IdbStoreSource, IdbTransaction, IdbTransactor,
    MemoryIdb, ObjectStoreOps,
};
pub use storage::{NativeStorage, StorageArea, StoragePrototype};
pub use xhr::{FetchXhr, ReadyState, XhrEventKind, XhrPrototype, XhrResponse, XmlHttpRequest};

use crate::Result;

/// The set of host APIs a recorder observes
#[derive(Debug)]
pub struct HostEnvironment {
    console: Console,
    fetch: Capability<dyn FetchApi>,
    xhr: Arc<Capability<dyn XhrPrototype>>,
    storage: Arc<Capability<dyn StoragePrototype>>,
    local_storage: Arc<StorageArea>,
    session_storage: Arc<StorageArea>,
    indexed_db: Capability<dyn IdbFactory>,
}

impl HostEnvironment {
    /// Builder with default backends
    #[must_use]
    pub fn builder() -> HostEnvironmentBuilder {
        HostEnvironmentBuilder::default()
    }

    /// Console slots
    #[must_use]
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// `fetch(input)` through the current slot content
    ///
    /// # Errors
    ///
    /// Returns error if the request fails
    pub async fn fetch(&self, input: impl Into<FetchInput>) -> Result<FetchResponse> {
        let fetch = self.fetch.get();
        fetch.fetch(input.into()).await
    }

    /// fetch slot
    #[must_use]
    pub fn fetch_capability(&self) -> &Capability<dyn FetchApi> {
        &self.fetch
    }

    /// `new XMLHttpRequest()`
    #[must_use]
    pub fn new_xhr(&self) -> XmlHttpRequest {
        XmlHttpRequest::new(Arc::clone(&self.xhr))
    }

    /// XHR prototype slot
    #[must_use]
    pub fn xhr_prototype(&self) -> &Capability<dyn XhrPrototype> {
        &self.xhr
    }

    /// Storage prototype slot
    #[must_use]
    pub fn storage_prototype(&self) -> &Capability<dyn StoragePrototype> {
        &self.storage
    }

    /// An additional storage area sharing the prototype
    #[must_use]
    pub fn new_storage_area(&self, label: &str) -> Arc<StorageArea> {
        Arc::new(StorageArea::new(label, Arc::clone(&self.storage), None))
    }

    /// `localStorage`
    #[must_use]
    pub fn local_storage(&self) -> &Arc<StorageArea> {
        &self.local_storage
    }

    /// `sessionStorage`
    #[must_use]
    pub fn session_storage(&self) -> &Arc<StorageArea> {
        &self.session_storage
    }

    /// `indexedDB` slot
    #[must_use]
    pub fn indexed_db(&self) -> &Capability<dyn IdbFactory> {
        &self.indexed_db
    }

    /// `indexedDB.open(name, version)` through the current slot content
    ///
    /// # Errors
    ///
    /// Returns error if the backend refuses the open
    pub async fn open_indexed_db(&self, name: &str, version: Option<u32>) -> Result<Arc<IdbDatabase>> {
        let factory = self.indexed_db.get();
        factory.open(name, version).await
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`HostEnvironment`]
#[derive(Default)]
pub struct HostEnvironmentBuilder {
    console: Option<Console>,
    fetch: Option<Arc<dyn FetchApi>>,
    xhr: Option<Arc<dyn XhrPrototype>>,
    storage: Option<Arc<dyn StoragePrototype>>,
    storage_quota: Option<usize>,
    indexed_db: Option<Arc<dyn IdbFactory>>,
}

impl HostEnvironmentBuilder {
    /// Use `console` instead of the tracing console
    #[must_use]
    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Use `fetch` instead of [`HttpFetch`]
    #[must_use]
    pub fn fetch(mut self, fetch: Arc<dyn FetchApi>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Use `xhr` instead of [`FetchXhr`] over the configured fetch
    #[must_use]
    pub fn xhr(mut self, xhr: Arc<dyn XhrPrototype>) -> Self {
        self.xhr = Some(xhr);
        self
    }

    /// Use `storage` instead of [`NativeStorage`]
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn StoragePrototype>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Byte quota for each singleton storage area
    #[must_use]
    pub fn storage_quota(mut self, bytes: usize) -> Self {
        self.storage_quota = Some(bytes);
        self
    }

    /// Use `factory` instead of [`MemoryIdb`]
    #[must_use]
    pub fn indexed_db(mut self, factory: Arc<dyn IdbFactory>) -> Self {
        self.indexed_db = Some(factory);
        self
    }

    /// Assemble the environment
    #[must_use]
    pub fn build(self) -> HostEnvironment {
        let fetch = self
            .fetch
            .unwrap_or_else(|| Arc::new(HttpFetch::new()) as Arc<dyn FetchApi>);
        let xhr = self
            .xhr
            .unwrap_or_else(|| Arc::new(FetchXhr::new(Arc::clone(&fetch))) as Arc<dyn XhrPrototype>);
        let storage: Arc<Capability<dyn StoragePrototype>> = Arc::new(Capability::new(
            self.storage.unwrap_or_else(|| Arc::new(NativeStorage)),
        ));

        HostEnvironment {
            console: self.console.unwrap_or_default(),
            fetch: Capability::new(fetch),
            xhr: Arc::new(Capability::new(xhr)),
            local_storage: Arc::new(StorageArea::new(
                "localStorage",
                Arc::clone(&storage),
                self.storage_quota,
            )),
            session_storage: Arc::new(StorageArea::new(
                "sessionStorage",
                Arc::clone(&storage),
                self.storage_quota,
            )),
            storage,
            indexed_db: Capability::new(
                self.indexed_db
                    .unwrap_or_else(|| Arc::new(MemoryIdb::new()) as Arc<dyn IdbFactory>),
            ),
        }
    }
}
