//! Realtime collection store.
//!
//! Wraps the repository with live queries: every accepted write is followed by a
//! full replacement snapshot for each subscribed query of the written collection.
//! Writes, their fan-out and subscription registration are serialized by one
//! async lock, so every observer sees non-decreasing revisions.

mod query;
mod subscription;

pub use query::*;
pub use subscription::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use sqlx::sqlite::SqliteRow;

use crate::db::{Record, Repository};
use crate::errors::{AppError, WriteRejection};
use crate::models::Identity;
use crate::role::RoleGate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotice {
    pub content: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLessonEntry {
    pub period: i64,
    pub subject: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub user_photo: Option<String>,
}

/// A record to create. The store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    Notice(NewNotice),
    Lesson(NewLessonEntry),
    Chat(NewChatMessage),
}

impl NewRecord {
    pub fn collection(&self) -> Collection {
        match self {
            NewRecord::Notice(_) => Collection::Notices,
            NewRecord::Lesson(_) => Collection::Learning,
            NewRecord::Chat(_) => Collection::Chats,
        }
    }
}

/// Acknowledgement of a durably accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub id: String,
    pub collection: Collection,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Store-side write rules. Notices and lesson entries need the moderator role.
#[derive(Debug, Clone)]
pub struct AccessRules {
    gate: RoleGate,
}

impl AccessRules {
    pub fn new(gate: RoleGate) -> Self {
        Self { gate }
    }

    pub fn authorize(&self, author: &Identity, collection: Collection) -> Result<(), AppError> {
        match collection {
            Collection::Notices | Collection::Learning
                if !self.gate.is_privileged(Some(author)) =>
            {
                tracing::warn!(
                    uid = %author.uid,
                    collection = %collection,
                    "Write denied by access rules"
                );
                Err(AppError::WriteRejected(WriteRejection::PermissionDenied))
            }
            _ => Ok(()),
        }
    }
}

type Deliver = Box<dyn Fn(i64, &[SqliteRow]) -> bool + Send>;

struct Listener {
    query: Query,
    deliver: Deliver,
}

/// Live listeners of one collection.
pub(crate) struct Listeners {
    entries: Mutex<HashMap<u64, Listener>>,
}

impl Listeners {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, id: u64, listener: Listener) {
        self.entries.lock().insert(id, listener);
    }

    pub(crate) fn remove(&self, id: u64) {
        self.entries.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Distinct live queries; each is evaluated once per write.
    fn queries(&self) -> Vec<Query> {
        let mut queries: Vec<Query> = Vec::new();
        for listener in self.entries.lock().values() {
            if !queries.contains(&listener.query) {
                queries.push(listener.query);
            }
        }
        queries
    }

    /// Hand a snapshot to every listener of `query`, dropping listeners that are gone or failed.
    fn deliver(&self, query: &Query, revision: i64, rows: &[SqliteRow]) {
        self.entries
            .lock()
            .retain(|_, listener| listener.query != *query || (listener.deliver)(revision, rows));
    }
}

fn listener_for<R: Record>(poster: Poster<R>) -> Deliver {
    Box::new(move |revision, rows| {
        let records: Result<Vec<R>, AppError> = rows.iter().map(R::from_row).collect();
        match records {
            Ok(records) => {
                poster.post(Ok(Snapshot { revision, records }));
                true
            }
            Err(e) => {
                tracing::warn!(
                    collection = %R::COLLECTION,
                    "Closing subscription after invalid record: {}",
                    e
                );
                poster.post(Err(e));
                false
            }
        }
    })
}

struct StoreInner {
    repo: Repository,
    rules: AccessRules,
    write_lock: tokio::sync::Mutex<()>,
    listeners: HashMap<Collection, Arc<Listeners>>,
    next_id: AtomicU64,
}

/// Realtime store shared by all views.
#[derive(Clone)]
pub struct RealtimeStore {
    inner: Arc<StoreInner>,
}

impl RealtimeStore {
    pub fn new(repo: Repository, rules: AccessRules) -> Self {
        let listeners = Collection::ALL
            .into_iter()
            .map(|collection| (collection, Arc::new(Listeners::new())))
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                repo,
                rules,
                write_lock: tokio::sync::Mutex::new(()),
                listeners,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn listeners(&self, collection: Collection) -> &Arc<Listeners> {
        // Every collection gets an entry in `new`
        &self.inner.listeners[&collection]
    }

    /// Number of live subscriptions on a collection.
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.listeners(collection).len()
    }

    /// Start a live query. The initial snapshot is pending before this returns.
    pub async fn subscribe<R: Record>(&self, query: Query) -> Result<Subscription<R>, AppError> {
        query.validate()?;
        if query.collection != R::COLLECTION {
            return Err(AppError::BadRequest(format!(
                "Query on {} cannot yield {} records",
                query.collection,
                R::COLLECTION
            )));
        }

        let _guard = self.inner.write_lock.lock().await;

        let revision = self.inner.repo.get_revision_id(query.collection).await?;
        let rows = self.inner.repo.select(&query).await?;

        let (poster, mailbox) = mailbox::<R>();
        let deliver = listener_for(poster);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listeners = self.listeners(query.collection);

        if deliver(revision, &rows) {
            listeners.insert(id, Listener { query, deliver });
        }

        tracing::debug!(
            subscription = id,
            collection = %query.collection,
            revision,
            "Subscribed"
        );

        Ok(Subscription::new(id, query, Arc::clone(listeners), mailbox))
    }

    /// Create a record. Returns once committed; visibility comes only through subscriptions.
    pub async fn create(
        &self,
        author: &Identity,
        record: NewRecord,
    ) -> Result<WriteReceipt, AppError> {
        self.inner.rules.authorize(author, record.collection())?;

        let _guard = self.inner.write_lock.lock().await;

        let receipt = self.inner.repo.insert(&record).await.map_err(|e| {
            tracing::warn!(collection = %record.collection(), "Write failed: {}", e);
            AppError::WriteRejected(WriteRejection::StoreUnavailable)
        })?;

        tracing::info!(
            collection = %receipt.collection,
            id = %receipt.id,
            revision = receipt.revision,
            "Record created"
        );

        self.publish(receipt.collection, receipt.revision).await;

        Ok(receipt)
    }

    async fn publish(&self, collection: Collection, revision: i64) {
        let listeners = self.listeners(collection);
        for query in listeners.queries() {
            match self.inner.repo.select(&query).await {
                Ok(rows) => listeners.deliver(&query, revision, &rows),
                // Listeners keep their last snapshot; the next write republishes
                Err(e) => tracing::warn!(
                    collection = %collection,
                    revision,
                    "Failed to build snapshot: {}",
                    e
                ),
            }
        }
    }
}
