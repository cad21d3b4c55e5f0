//! In-process document store implementing [`DataSource`].
//!
//! Every subscription gets its own unbounded channel and a spawned task that
//! drains it into the sink, so deliveries for one subscription arrive in the
//! order they were produced while sinks never run under the store lock. A
//! subscriber is re-notified only when the set of documents matching its query
//! actually changed.

use crate::errors::SubscriptionError;
use crate::live::{
    key::LiveQuery,
    source::{CancellationHandle, DataSource, Document, SnapshotSink, SourceEvent},
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type Collection = BTreeMap<String, Value>;

struct Watcher {
    query: LiveQuery,
    tx: mpsc::UnboundedSender<SourceEvent>,
}

#[derive(Default)]
struct Store {
    collections: HashMap<String, Collection>,
    watchers: BTreeMap<u64, Watcher>,
    next_watcher_id: u64,
    rejected: HashMap<String, String>,
}

impl Store {
    fn snapshot(&self, query: &LiveQuery) -> Vec<Document> {
        self.collections
            .get(&query.collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, data)| query.matches(data))
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Applies `change` to one collection and re-delivers to the watchers whose
    /// result set changed.
    fn mutate(&mut self, collection: &str, change: impl FnOnce(&mut Collection)) {
        let before: Vec<(u64, Vec<Document>)> = self
            .watchers
            .iter()
            .filter(|(_, watcher)| watcher.query.collection == collection)
            .map(|(id, watcher)| (*id, self.snapshot(&watcher.query)))
            .collect();

        change(self.collections.entry(collection.to_string()).or_default());

        for (id, previous) in before {
            if let Some(watcher) = self.watchers.get(&id) {
                let current = self.snapshot(&watcher.query);
                if current != previous {
                    trace!(
                        "Re-delivering {} documents of {} to watcher {}",
                        current.len(),
                        collection,
                        id
                    );
                    // A closed channel means the watcher is being cancelled.
                    let _ = watcher.tx.send(Ok(current));
                }
            }
        }
    }
}

/// Push-capable in-memory source. Cloning shares the same store.
#[derive(Clone, Default)]
pub struct MemorySource {
    store: Arc<Mutex<Store>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces one document.
    pub fn upsert(&self, collection: &str, document: Document) {
        self.store().mutate(collection, |documents| {
            documents.insert(document.id, document.data);
        });
    }

    /// Removes one document. Removing a missing document does nothing.
    pub fn remove(&self, collection: &str, document_id: &str) {
        self.store().mutate(collection, |documents| {
            documents.remove(document_id);
        });
    }

    /// Replaces every document of `filter.collection` matching `filter` with
    /// `documents`, as one change.
    pub fn replace_matching(&self, filter: &LiveQuery, documents: Vec<Document>) {
        self.store().mutate(&filter.collection, |existing| {
            existing.retain(|_, data| !filter.matches(data));
            existing.extend(documents.into_iter().map(|d| (d.id, d.data)));
        });
    }

    /// Current documents matching a query, ordered by id.
    #[must_use]
    pub fn query(&self, query: &LiveQuery) -> Vec<Document> {
        self.store().snapshot(query)
    }

    /// Delivers a transient error to every watcher of a collection.
    pub fn push_error(&self, collection: &str, error: &SubscriptionError) {
        let store = self.store();
        for watcher in store.watchers.values() {
            if watcher.query.collection == collection {
                let _ = watcher.tx.send(Err(error.clone()));
            }
        }
    }

    /// Makes every later subscribe on `collection` fail.
    pub fn reject_collection(&self, collection: &str, message: &str) {
        self.store()
            .rejected
            .insert(collection.to_string(), message.to_string());
    }

    /// Lifts a rejection set by [`Self::reject_collection`].
    #[cfg(test)]
    pub(crate) fn clear_rejection(&self, collection: &str) {
        self.store().rejected.remove(collection);
    }

    /// Number of live watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.store().watchers.len()
    }
}

impl DataSource for MemorySource {
    fn subscribe(
        &self,
        query: &LiveQuery,
        sink: SnapshotSink,
    ) -> Result<Box<dyn CancellationHandle>, SubscriptionError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| SubscriptionError::Unavailable {
                message: format!("no async runtime to deliver on: {e}"),
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<SourceEvent>();
        let watcher_id = {
            let mut store = self.store();
            if let Some(message) = store.rejected.get(&query.collection) {
                return Err(SubscriptionError::Rejected {
                    collection: query.collection.clone(),
                    message: message.clone(),
                });
            }

            let initial = store.snapshot(query);
            // The receiver is alive in this scope.
            let _ = tx.send(Ok(initial));

            let id = store.next_watcher_id;
            store.next_watcher_id += 1;
            store.watchers.insert(
                id,
                Watcher {
                    query: query.clone(),
                    tx,
                },
            );
            id
        };

        let task = runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                sink(event);
            }
        });

        debug!("Watcher {} opened on {}", watcher_id, query.collection);
        Ok(Box::new(MemoryHandle {
            store: Arc::clone(&self.store),
            watcher_id,
            task,
        }))
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("watchers", &self.watcher_count())
            .finish_non_exhaustive()
    }
}

struct MemoryHandle {
    store: Arc<Mutex<Store>>,
    watcher_id: u64,
    task: JoinHandle<()>,
}

impl CancellationHandle for MemoryHandle {
    fn cancel(self: Box<Self>) {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .watchers
            .remove(&self.watcher_id);
        self.task.abort();
        debug!("Watcher {} cancelled", self.watcher_id);
    }
}
