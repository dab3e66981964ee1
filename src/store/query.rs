//! Query shape for live collections: one collection, one sort field, one direction, optional limit.

use std::fmt;

use crate::errors::AppError;

/// A named realtime collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Notices,
    Learning,
    Chats,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Notices, Collection::Learning, Collection::Chats];

    /// Collection name; also the backing table name.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Notices => "notices",
            Collection::Learning => "learning",
            Collection::Chats => "chats",
        }
    }

    /// Sort fields this collection can be queried by.
    pub fn order_keys(&self) -> &'static [OrderKey] {
        match self {
            Collection::Notices | Collection::Chats => &[OrderKey::CreatedAt],
            Collection::Learning => &[OrderKey::Period, OrderKey::CreatedAt],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKey {
    CreatedAt,
    Period,
}

impl OrderKey {
    pub fn column(&self) -> &'static str {
        match self {
            OrderKey::CreatedAt => "created_at",
            OrderKey::Period => "period",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// What a subscriber sees: the `limit` most extreme records by key and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Query {
    pub collection: Collection,
    pub order_key: OrderKey,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection, order_key: OrderKey, direction: Direction) -> Self {
        Self {
            collection,
            order_key,
            direction,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.collection.order_keys().contains(&self.order_key) {
            return Err(AppError::BadRequest(format!(
                "{} cannot be ordered by {}",
                self.collection,
                self.order_key.column()
            )));
        }
        match self.limit {
            Some(0) => {
                return Err(AppError::BadRequest("Query limit must be positive".to_string()));
            }
            // SQLite binds the limit as a signed 64-bit integer
            Some(limit) if i64::try_from(limit).is_err() => {
                return Err(AppError::BadRequest(format!("Query limit {} is too large", limit)));
            }
            _ => {}
        }
        Ok(())
    }

    /// SQL for this query. Ties on the key fall back to insertion order in the same direction.
    pub(crate) fn to_sql(&self) -> String {
        let dir = self.direction.sql();
        let mut sql = format!(
            "SELECT * FROM {} ORDER BY {} {dir}, seq {dir}",
            self.collection.name(),
            self.order_key.column(),
        );
        if self.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }
        sql
    }
}
