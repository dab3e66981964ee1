//! Database repository for collection reads and writes.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::Record;
use crate::errors::AppError;
use crate::models::{ChatMessage, LessonEntry, Notice};
use crate::store::{Collection, NewRecord, Query, WriteReceipt};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID of a collection.
    pub async fn get_revision_id(&self, collection: Collection) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM revisions WHERE collection = ?")
            .bind(collection.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Run a collection query and return the raw rows in query order.
    pub async fn select(&self, query: &Query) -> Result<Vec<SqliteRow>, AppError> {
        let sql = query.to_sql();
        let mut statement = sqlx::query(&sql);
        if let Some(limit) = query.limit {
            let limit = i64::try_from(limit)
                .map_err(|_| AppError::BadRequest(format!("Query limit {} is too large", limit)))?;
            statement = statement.bind(limit);
        }
        Ok(statement.fetch_all(&self.pool).await?)
    }

    /// Insert a record with a store-assigned id and timestamp, bumping the collection revision.
    pub async fn insert(&self, record: &NewRecord) -> Result<WriteReceipt, AppError> {
        let collection = record.collection();
        let id = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        // Never go below the newest existing timestamp, even if the clock stepped back
        let latest_sql = format!(
            "SELECT COALESCE(MAX(created_at), 0) FROM {}",
            collection.name()
        );
        let latest: i64 = sqlx::query_scalar(&latest_sql)
            .fetch_one(&mut *tx)
            .await?;
        let created_at = Utc::now().timestamp_micros().max(latest);

        match record {
            NewRecord::Notice(notice) => {
                sqlx::query(
                    "INSERT INTO notices (id, content, created_by, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&notice.content)
                .bind(&notice.created_by)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
            }
            NewRecord::Lesson(lesson) => {
                sqlx::query(
                    "INSERT INTO learning (id, period, subject, created_by, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(lesson.period)
                .bind(&lesson.subject)
                .bind(&lesson.created_by)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
            }
            NewRecord::Chat(message) => {
                sqlx::query(
                    "INSERT INTO chats (id, text, user_id, user_name, user_photo, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&message.text)
                .bind(&message.user_id)
                .bind(&message.user_name)
                .bind(&message.user_photo)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("UPDATE revisions SET revision_id = revision_id + 1 WHERE collection = ?")
            .bind(collection.name())
            .execute(&mut *tx)
            .await?;
        let revision: i64 =
            sqlx::query_scalar("SELECT revision_id FROM revisions WHERE collection = ?")
                .bind(collection.name())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(WriteReceipt {
            id,
            collection,
            created_at: timestamp_from_micros(created_at)?,
            revision,
        })
    }
}

// Row conversion, validated at the subscription boundary

impl Record for Notice {
    const COLLECTION: Collection = Collection::Notices;

    fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Notice {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            created_at: timestamp_from_micros(row.try_get("created_at")?)?,
        })
    }
}

impl Record for LessonEntry {
    const COLLECTION: Collection = Collection::Learning;

    fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        let period: i64 = row.try_get("period")?;
        if period <= 0 {
            return Err(AppError::Internal(format!(
                "Lesson entry has non-positive period {}",
                period
            )));
        }
        Ok(LessonEntry {
            id: row.try_get("id")?,
            period,
            subject: row.try_get("subject")?,
            created_at: timestamp_from_micros(row.try_get("created_at")?)?,
        })
    }
}

impl Record for ChatMessage {
    const COLLECTION: Collection = Collection::Chats;

    fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(ChatMessage {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            user_id: row.try_get("user_id")?,
            user_name: row.try_get("user_name")?,
            user_photo: row.try_get("user_photo")?,
            created_at: timestamp_from_micros(row.try_get("created_at")?)?,
        })
    }
}

fn timestamp_from_micros(micros: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| AppError::Internal(format!("Timestamp out of range: {}", micros)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::store::{Direction, NewNotice, OrderKey};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn notice(content: &str) -> NewRecord {
        NewRecord::Notice(NewNotice {
            content: content.to_string(),
            created_by: "teacher".to_string(),
        })
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_ids_and_bumps_revision() {
        let (repo, _dir) = repo().await;
        assert_eq!(repo.get_revision_id(Collection::Notices).await.unwrap(), 0);

        let first = repo.insert(&notice("one")).await.unwrap();
        let second = repo.insert(&notice("two")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 2);
        assert!(second.created_at >= first.created_at);
        assert_eq!(repo.get_revision_id(Collection::Notices).await.unwrap(), 2);
        assert_eq!(repo.get_revision_id(Collection::Chats).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_select_orders_and_truncates() {
        let (repo, _dir) = repo().await;
        for content in ["a", "b", "c", "d"] {
            repo.insert(&notice(content)).await.unwrap();
        }

        let query =
            Query::new(Collection::Notices, OrderKey::CreatedAt, Direction::Descending).limit(3);
        let rows = repo.select(&query).await.unwrap();
        let contents: Vec<String> = rows
            .iter()
            .map(|row| Notice::from_row(row).unwrap().content)
            .collect();

        assert_eq!(contents, ["d", "c", "b"]);
    }

    #[tokio::test]
    async fn test_select_refuses_limit_beyond_sqlite_range() {
        let (repo, _dir) = repo().await;
        repo.insert(&notice("a")).await.unwrap();

        let query = Query::new(Collection::Notices, OrderKey::CreatedAt, Direction::Descending)
            .limit(usize::MAX);
        assert!(matches!(
            repo.select(&query).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
