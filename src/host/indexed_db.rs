//! IndexedDB capability
//!
//! The factory opens [`IdbDatabase`] connections. Each connection owns a
//! swappable transactor, each transaction hands out object stores through a
//! replaceable store source, and each store routes mutations through
//! [`ObjectStoreOps`]. Interceptors wrap these layers one level at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::capability::Capability;
use crate::event::IdbMode;
use crate::{Result, TapError};

/// `indexedDB` itself
#[async_trait]
pub trait IdbFactory: Send + Sync {
    /// `indexedDB.open(name, version)`
    ///
    /// # Errors
    ///
    /// Returns error if the requested version is older than the stored one
    async fn open(&self, name: &str, version: Option<u32>) -> Result<Arc<IdbDatabase>>;
}

/// `db.transaction` behaviour of one connection
pub trait IdbTransactor: Send + Sync {
    /// Start a transaction over `store_names`
    ///
    /// # Errors
    ///
    /// Returns error if the scope is empty
    fn transaction(
        &self,
        db: &IdbDatabase,
        store_names: &[String],
        mode: IdbMode,
    ) -> Result<IdbTransaction>;
}

/// `tx.objectStore` behaviour of one transaction
pub trait IdbStoreSource: Send + Sync {
    /// Handle for store `name`
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened
    fn object_store(&self, tx: &IdbTransaction, name: &str) -> Result<IdbObjectStore>;
}

/// Mutations and reads of one object store handle
pub trait ObjectStoreOps: Send + Sync {
    /// Insert; fails if `key` exists
    ///
    /// # Errors
    ///
    /// Returns error on key conflict or a read-only transaction
    fn add(&self, key: Value, value: Value) -> Result<()>;
    /// Insert or overwrite
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    fn put(&self, key: Value, value: Value) -> Result<()>;
    /// Remove `key`
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    fn delete(&self, key: Value) -> Result<()>;
    /// Remove every record
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    fn clear(&self) -> Result<()>;
    /// Read `key`
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn get(&self, key: &Value) -> Result<Option<Value>>;
}

/// An open database connection
pub struct IdbDatabase {
    name: String,
    version: u32,
    transactor: Capability<dyn IdbTransactor>,
}

impl IdbDatabase {
    /// Connection to `name` at `version`
    pub fn new(name: impl Into<String>, version: u32, transactor: Arc<dyn IdbTransactor>) -> Self {
        Self {
            name: name.into(),
            version,
            transactor: Capability::new(transactor),
        }
    }

    /// Database name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version the connection was opened at
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// This connection's `transaction` slot
    #[must_use]
    pub fn transactor(&self) -> &Capability<dyn IdbTransactor> {
        &self.transactor
    }

    /// `db.transaction(storeNames, mode)`
    ///
    /// # Errors
    ///
    /// Returns error if the backend refuses the transaction
    pub fn transaction(&self, store_names: &[&str], mode: IdbMode) -> Result<IdbTransaction> {
        let names: Vec<String> = store_names.iter().map(|s| (*s).to_string()).collect();
        self.transactor.get().transaction(self, &names, mode)
    }
}

impl fmt::Debug for IdbDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdbDatabase")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A transaction over a fixed set of stores
pub struct IdbTransaction {
    db_name: String,
    store_names: Vec<String>,
    mode: IdbMode,
    stores: Arc<dyn IdbStoreSource>,
}

impl IdbTransaction {
    /// Transaction handing out stores from `stores`
    pub fn new(
        db_name: impl Into<String>,
        store_names: Vec<String>,
        mode: IdbMode,
        stores: Arc<dyn IdbStoreSource>,
    ) -> Self {
        Self {
            db_name: db_name.into(),
            store_names,
            mode,
            stores,
        }
    }

    /// Owning database
    #[must_use]
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Stores in scope
    #[must_use]
    pub fn store_names(&self) -> &[String] {
        &self.store_names
    }

    /// Access mode
    #[must_use]
    pub fn mode(&self) -> IdbMode {
        self.mode
    }

    /// Replace the store source with a wrapper around it
    pub fn wrap_stores(&mut self, build: impl FnOnce(Arc<dyn IdbStoreSource>) -> Arc<dyn IdbStoreSource>) {
        self.stores = build(Arc::clone(&self.stores));
    }

    /// `tx.objectStore(name)`
    ///
    /// # Errors
    ///
    /// Returns error if `name` is outside the transaction's scope
    pub fn object_store(&self, name: &str) -> Result<IdbObjectStore> {
        if !self.store_names.iter().any(|s| s == name) {
            return Err(TapError::IndexedDb(format!(
                "NotFoundError: '{name}' is not in this transaction's scope"
            )));
        }
        Arc::clone(&self.stores).object_store(self, name)
    }
}

impl fmt::Debug for IdbTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdbTransaction")
            .field("db_name", &self.db_name)
            .field("store_names", &self.store_names)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Handle to one object store within a transaction
pub struct IdbObjectStore {
    name: String,
    ops: Arc<dyn ObjectStoreOps>,
}

impl IdbObjectStore {
    /// Store `name` backed by `ops`
    pub fn new(name: impl Into<String>, ops: Arc<dyn ObjectStoreOps>) -> Self {
        Self {
            name: name.into(),
            ops,
        }
    }

    /// Store name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the operations with a wrapper around them
    #[must_use]
    pub fn wrap_ops(mut self, build: impl FnOnce(Arc<dyn ObjectStoreOps>) -> Arc<dyn ObjectStoreOps>) -> Self {
        self.ops = build(self.ops);
        self
    }

    /// `store.add(value, key)`
    ///
    /// # Errors
    ///
    /// Returns error on key conflict or a read-only transaction
    pub fn add(&self, key: Value, value: Value) -> Result<()> {
        self.ops.add(key, value)
    }

    /// `store.put(value, key)`
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    pub fn put(&self, key: Value, value: Value) -> Result<()> {
        self.ops.put(key, value)
    }

    /// `store.delete(key)`
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    pub fn delete(&self, key: Value) -> Result<()> {
        self.ops.delete(key)
    }

    /// `store.clear()`
    ///
    /// # Errors
    ///
    /// Returns error on a read-only transaction
    pub fn clear(&self) -> Result<()> {
        self.ops.clear()
    }

    /// `store.get(key)`
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        self.ops.get(key)
    }
}

impl fmt::Debug for IdbObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdbObjectStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

type Records = Arc<Mutex<BTreeMap<String, Value>>>;

#[derive(Default)]
struct MemoryDatabase {
    version: Mutex<u32>,
    stores: DashMap<String, Records>,
}

/// In-memory IndexedDB backend
#[derive(Default)]
pub struct MemoryIdb {
    databases: DashMap<String, Arc<MemoryDatabase>>,
}

impl MemoryIdb {
    /// Empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored version of `name`, if it exists
    #[must_use]
    pub fn version_of(&self, name: &str) -> Option<u32> {
        self.databases.get(name).map(|db| *db.version.lock())
    }
}

impl fmt::Debug for MemoryIdb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIdb")
            .field("databases", &self.databases.len())
            .finish()
    }
}

#[async_trait]
impl IdbFactory for MemoryIdb {
    async fn open(&self, name: &str, version: Option<u32>) -> Result<Arc<IdbDatabase>> {
        let db = Arc::clone(self.databases.entry(name.to_string()).or_default().value());

        let opened = {
            let mut current = db.version.lock();
            let requested = version.unwrap_or_else(|| (*current).max(1));
            if requested < *current {
                return Err(TapError::IndexedDb(format!(
                    "VersionError: requested version {requested} is less than existing version {}",
                    *current
                )));
            }
            if requested > *current {
                debug!(db = name, from = *current, to = requested, "upgrading database");
                *current = requested;
            }
            requested
        };

        Ok(Arc::new(IdbDatabase::new(
            name,
            opened,
            Arc::new(MemoryTransactor { db }),
        )))
    }
}

struct MemoryTransactor {
    db: Arc<MemoryDatabase>,
}

impl IdbTransactor for MemoryTransactor {
    fn transaction(
        &self,
        db: &IdbDatabase,
        store_names: &[String],
        mode: IdbMode,
    ) -> Result<IdbTransaction> {
        if store_names.is_empty() {
            return Err(TapError::IndexedDb(
                "InvalidAccessError: transaction scope is empty".to_string(),
            ));
        }
        Ok(IdbTransaction::new(
            db.name(),
            store_names.to_vec(),
            mode,
            Arc::new(MemoryStoreSource {
                db: Arc::clone(&self.db),
            }),
        ))
    }
}

struct MemoryStoreSource {
    db: Arc<MemoryDatabase>,
}

impl IdbStoreSource for MemoryStoreSource {
    fn object_store(&self, tx: &IdbTransaction, name: &str) -> Result<IdbObjectStore> {
        let records = Arc::clone(self.db.stores.entry(name.to_string()).or_default().value());
        Ok(IdbObjectStore::new(
            name,
            Arc::new(MemoryStoreOps {
                store: name.to_string(),
                records,
                mode: tx.mode(),
            }),
        ))
    }
}

struct MemoryStoreOps {
    store: String,
    records: Records,
    mode: IdbMode,
}

impl MemoryStoreOps {
    fn writable(&self) -> Result<()> {
        match self.mode {
            IdbMode::Readwrite => Ok(()),
            IdbMode::Readonly => Err(TapError::IndexedDb(format!(
                "ReadOnlyError: '{}' was opened in a readonly transaction",
                self.store
            ))),
        }
    }
}

impl ObjectStoreOps for MemoryStoreOps {
    fn add(&self, key: Value, value: Value) -> Result<()> {
        self.writable()?;
        let mut records = self.records.lock();
        let key = key.to_string();
        if records.contains_key(&key) {
            return Err(TapError::IndexedDb(format!(
                "ConstraintError: key {key} already exists in '{}'",
                self.store
            )));
        }
        records.insert(key, value);
        Ok(())
    }

    fn put(&self, key: Value, value: Value) -> Result<()> {
        self.writable()?;
        self.records.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: Value) -> Result<()> {
        self.writable()?;
        self.records.lock().remove(&key.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.writable()?;
        self.records.lock().clear();
        Ok(())
    }

    fn get(&self, key: &Value) -> Result<Option<Value>> {
        Ok(self.records.lock().get(&key.to_string()).cloned())
    }
}
