use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::event::{Event, EventSink, IdbAction, IdbMode, IndexedDbEvent};
use crate::host::{
    HostEnvironment, IdbDatabase, IdbFactory, IdbObjectStore, IdbStoreSource, IdbTransaction,
    IdbTransactor, ObjectStoreOps,
};
use crate::Result;

use super::Interceptor;

/// Records IndexedDB opens, transactions and store mutations.
///
/// Connections, transactions and stores opened while installed keep their
/// wrappers after uninstall; they stop recording once their session ends.
#[derive(Default)]
pub struct IndexedDbInterceptor {
    original: Option<Arc<dyn IdbFactory>>,
}

impl IndexedDbInterceptor {
    /// Uninstalled interceptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Interceptor for IndexedDbInterceptor {
    fn name(&self) -> &'static str {
        "indexedDB"
    }

    fn install(&mut self, host: &HostEnvironment, sink: &EventSink) {
        if self.original.is_some() {
            return;
        }
        self.original = Some(host.indexed_db().wrap(|original| {
            Arc::new(RecordingFactory {
                original,
                sink: sink.clone(),
            })
        }));
    }

    fn uninstall(&mut self, host: &HostEnvironment) {
        if let Some(original) = self.original.take() {
            host.indexed_db().replace(original);
        }
    }

    fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}

fn record(sink: &EventSink, action: IdbAction, db_name: &str, fill: impl FnOnce(&mut IndexedDbEvent)) {
    sink.record(|timestamp| {
        let mut event = IndexedDbEvent::new(action, db_name.to_string(), timestamp);
        fill(&mut event);
        Event::IndexedDb(event)
    });
}

struct RecordingFactory {
    original: Arc<dyn IdbFactory>,
    sink: EventSink,
}

#[async_trait]
impl IdbFactory for RecordingFactory {
    async fn open(&self, name: &str, version: Option<u32>) -> Result<Arc<IdbDatabase>> {
        record(&self.sink, IdbAction::Open, name, |e| e.version = version);

        let db = self.original.open(name, version).await?;
        let sink = self.sink.clone();
        db.transactor()
            .wrap(|original| Arc::new(RecordingTransactor { original, sink }));
        Ok(db)
    }
}

struct RecordingTransactor {
    original: Arc<dyn IdbTransactor>,
    sink: EventSink,
}

impl IdbTransactor for RecordingTransactor {
    fn transaction(
        &self,
        db: &IdbDatabase,
        store_names: &[String],
        mode: IdbMode,
    ) -> Result<IdbTransaction> {
        record(&self.sink, IdbAction::Transaction, db.name(), |e| {
            e.store_names = Some(store_names.to_vec());
            e.mode = Some(mode);
        });

        let mut tx = self.original.transaction(db, store_names, mode)?;
        let sink = self.sink.clone();
        tx.wrap_stores(|original| Arc::new(RecordingStoreSource { original, sink }));
        Ok(tx)
    }
}

struct RecordingStoreSource {
    original: Arc<dyn IdbStoreSource>,
    sink: EventSink,
}

impl IdbStoreSource for RecordingStoreSource {
    fn object_store(&self, tx: &IdbTransaction, name: &str) -> Result<IdbObjectStore> {
        let store = self.original.object_store(tx, name)?;
        let sink = self.sink.clone();
        let db_name = tx.db_name().to_string();
        let store_name = store.name().to_string();
        Ok(store.wrap_ops(|original| {
            Arc::new(RecordingStoreOps {
                original,
                sink,
                db_name,
                store_name,
            })
        }))
    }
}

struct RecordingStoreOps {
    original: Arc<dyn ObjectStoreOps>,
    sink: EventSink,
    db_name: String,
    store_name: String,
}

impl RecordingStoreOps {
    fn record(&self, action: IdbAction, data: Option<&Value>) {
        let data = data.map(|d| self.sink.stringify(d));
        record(&self.sink, action, &self.db_name, |e| {
            e.store_name = Some(self.store_name.clone());
            e.data = data;
        });
    }
}

impl ObjectStoreOps for RecordingStoreOps {
    fn add(&self, key: Value, value: Value) -> Result<()> {
        self.record(IdbAction::Add, Some(&value));
        self.original.add(key, value)
    }

    fn put(&self, key: Value, value: Value) -> Result<()> {
        self.record(IdbAction::Put, Some(&value));
        self.original.put(key, value)
    }

    fn delete(&self, key: Value) -> Result<()> {
        self.record(IdbAction::Delete, Some(&key));
        self.original.delete(key)
    }

    fn clear(&self) -> Result<()> {
        self.record(IdbAction::Clear, None);
        self.original.clear()
    }

    fn get(&self, key: &Value) -> Result<Option<Value>> {
        self.original.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SessionClock;
    use crate::event::EventLog;
    use serde_json::json;

    fn idb_events(log: &EventLog) -> Vec<IndexedDbEvent> {
        log.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                Event::IndexedDb(idb) => Some(idb),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_wraps_every_layer() {
        let host = HostEnvironment::default();
        let log = Arc::new(EventLog::new());
        let session = log.begin(SessionClock::start());
        let sink = EventSink::new(Arc::clone(&log), session, 500);

        let mut interceptor = IndexedDbInterceptor::new();
        interceptor.install(&host, &sink);

        let db = host.open_indexed_db("app", Some(2)).await.unwrap();
        for _ in 0..2 {
            let tx = db.transaction(&["users"], IdbMode::Readwrite).unwrap();
            let users = tx.object_store("users").unwrap();
            users.put(json!(1), json!({"name": "ada"})).unwrap();
        }
        let tx = db.transaction(&["users"], IdbMode::Readwrite).unwrap();
        let users = tx.object_store("users").unwrap();
        users.delete(json!(1)).unwrap();
        users.clear().unwrap();

        let events = idb_events(&log);
        let actions: Vec<IdbAction> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                IdbAction::Open,
                IdbAction::Transaction,
                IdbAction::Put,
                IdbAction::Transaction,
                IdbAction::Put,
                IdbAction::Transaction,
                IdbAction::Delete,
                IdbAction::Clear,
            ]
        );
        assert_eq!(events[0].version, Some(2));
        assert_eq!(events[1].store_names, Some(vec!["users".to_string()]));
        assert_eq!(events[1].mode, Some(IdbMode::Readwrite));
        assert_eq!(events[2].store_name.as_deref(), Some("users"));
        assert_eq!(events[2].data.as_deref(), Some(r#"{"name":"ada"}"#));
        assert_eq!(events[6].data.as_deref(), Some("1"));
        assert_eq!(events[7].data, None);
    }

    #[tokio::test]
    async fn test_stale_connection_stops_logging() {
        let host = HostEnvironment::default();
        let log = Arc::new(EventLog::new());
        let first = log.begin(SessionClock::start());
        let sink = EventSink::new(Arc::clone(&log), first, 500);

        let mut interceptor = IndexedDbInterceptor::new();
        interceptor.install(&host, &sink);
        let db = host.open_indexed_db("app", None).await.unwrap();
        interceptor.uninstall(&host);
        log.finish();

        log.begin(SessionClock::start());
        let tx = db.transaction(&["s"], IdbMode::Readwrite).unwrap();
        tx.object_store("s").unwrap().add(json!("k"), json!(1)).unwrap();
        assert!(log.is_empty());
    }
}
