//! Live subscription handles.
//!
//! Each subscription owns a single-slot mailbox. A new snapshot replaces one the
//! reader has not taken yet, so a slow reader skips straight to the latest
//! revision instead of working through a backlog.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Listeners, Query};
use crate::errors::AppError;

/// A complete, ordered result of a query at one revision of its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<R> {
    pub revision: i64,
    pub records: Vec<R>,
}

pub(crate) type Delivery<R> = Result<Snapshot<R>, AppError>;

struct Slot<R> {
    latest: Option<Delivery<R>>,
    closed: bool,
}

/// Latest pending delivery of one subscription.
pub(crate) struct Mailbox<R> {
    slot: Mutex<Slot<R>>,
    notify: Notify,
}

impl<R> Mailbox<R> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn put(&self, delivery: Delivery<R>) {
        let mut slot = self.slot.lock();
        if slot.closed {
            return;
        }
        slot.latest = Some(delivery);
        drop(slot);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.slot.lock().closed = true;
        self.notify.notify_one();
    }

    /// Closes and discards whatever is pending.
    fn discard(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.latest = None;
    }

    /// The pending delivery, or `None` once closed and drained.
    async fn take(&self) -> Option<Delivery<R>> {
        loop {
            {
                let mut slot = self.slot.lock();
                if let Some(delivery) = slot.latest.take() {
                    return Some(delivery);
                }
                if slot.closed {
                    return None;
                }
            }
            // A permit stored by `notify_one` wakes this even if the put came first
            self.notify.notified().await;
        }
    }
}

/// Store-side end of a mailbox. Dropping it closes the subscription.
pub(crate) struct Poster<R> {
    mailbox: Arc<Mailbox<R>>,
}

impl<R> Poster<R> {
    pub(crate) fn post(&self, delivery: Delivery<R>) {
        self.mailbox.put(delivery);
    }
}

impl<R> Drop for Poster<R> {
    fn drop(&mut self) {
        self.mailbox.close();
    }
}

pub(crate) fn mailbox<R>() -> (Poster<R>, Arc<Mailbox<R>>) {
    let mailbox = Arc::new(Mailbox::new());
    let poster = Poster {
        mailbox: Arc::clone(&mailbox),
    };
    (poster, mailbox)
}

/// Handle to a live query. Dropping it unsubscribes.
pub struct Subscription<R> {
    id: u64,
    query: Query,
    listeners: Arc<Listeners>,
    mailbox: Option<Arc<Mailbox<R>>>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Subscription<R> {
    pub(crate) fn new(
        id: u64,
        query: Query,
        listeners: Arc<Listeners>,
        mailbox: Arc<Mailbox<R>>,
    ) -> Self {
        Self {
            id,
            query,
            listeners,
            mailbox: Some(mailbox),
            _record: PhantomData,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        self.mailbox.is_some()
    }

    /// Wait for the next snapshot.
    ///
    /// Only the newest undelivered snapshot is kept, so revisions can be skipped
    /// but never go backwards. Returns `None` once unsubscribed or after the store
    /// closed the subscription. An `Err` item is always the last one: the store
    /// drops the listener when it cannot build a snapshot for it.
    pub async fn next(&mut self) -> Option<Result<Snapshot<R>, AppError>> {
        let mailbox = self.mailbox.as_ref()?;
        let item = mailbox.take().await;
        if item.is_none() {
            self.mailbox = None;
        }
        item
    }

    /// Stop receiving snapshots. Idempotent.
    ///
    /// The listener is removed under the lock that delivers snapshots, and a pending
    /// snapshot is discarded, so `next` yields nothing after this returns.
    pub fn unsubscribe(&mut self) {
        if let Some(mailbox) = self.mailbox.take() {
            self.listeners.remove(self.id);
            mailbox.discard();
            tracing::debug!(
                subscription = self.id,
                collection = %self.query.collection,
                "Unsubscribed"
            );
        }
    }
}

impl<R> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<R> std::fmt::Debug for Subscription<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("active", &self.is_active())
            .finish()
    }
}
