use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flow::{feed::EventFeed, store::StepStore};
use shared::{
    domain::{EventId, Namespace, UserId},
    event::{EventRecord, EventStatus, EventType, NotifStatus},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One in-progress flow (or session) as listed by admin tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSummary {
    pub namespace: Namespace,
    pub fields: i64,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true);
        // Every connection to an in-memory url opens its own empty database.
        let max_connections = if database_url == MEMORY_URL { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run storage migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn draft_summaries(&self) -> Result<Vec<DraftSummary>> {
        let rows = sqlx::query(
            "SELECT namespace, COUNT(*) AS fields, MAX(updated_at) AS updated_at
             FROM drafts
             GROUP BY namespace
             ORDER BY updated_at DESC, namespace",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list drafts")?;

        rows.into_iter()
            .map(|row| -> Result<DraftSummary> {
                Ok(DraftSummary {
                    namespace: Namespace::from_raw(row.try_get::<String, _>("namespace")?),
                    fields: row.try_get("fields")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    /// Inserts or replaces an event as delivered by the backend.
    pub async fn insert_event(&self, record: &EventRecord) -> Result<()> {
        let context =
            serde_json::to_string(&record.context).context("failed to encode event context")?;
        sqlx::query(
            "INSERT INTO events (id, viewer_id, event_type, status, notif_status, title, message, context, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                viewer_id = excluded.viewer_id,
                event_type = excluded.event_type,
                status = excluded.status,
                notif_status = excluded.notif_status,
                title = excluded.title,
                message = excluded.message,
                context = excluded.context,
                created_at = excluded.created_at",
        )
        .bind(record.id.as_str())
        .bind(record.viewer_id.as_str())
        .bind(record.event_type.as_str())
        .bind(record.status.as_str())
        .bind(record.notif_status.as_str())
        .bind(&record.title)
        .bind(&record.message)
        .bind(context)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store event {}", record.id))?;
        Ok(())
    }

    pub async fn event(&self, id: &EventId) -> Result<Option<EventRecord>> {
        let row = sqlx::query(
            "SELECT id, viewer_id, event_type, status, notif_status, title, message, context, created_at
             FROM events WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load event {id}"))?;
        row.as_ref().map(event_from_row).transpose()
    }

    pub async fn delete_event(&self, id: &EventId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete event {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn event_from_row(row: &SqliteRow) -> Result<EventRecord> {
    let id: String = row.try_get("id")?;
    let context: String = row.try_get("context")?;
    let context: BTreeMap<String, String> = serde_json::from_str(&context)
        .with_context(|| format!("event {id} has a malformed context"))?;

    Ok(EventRecord {
        viewer_id: UserId::new(row.try_get::<String, _>("viewer_id")?),
        event_type: EventType::parse(&row.try_get::<String, _>("event_type")?),
        status: EventStatus::parse(&row.try_get::<String, _>("status")?),
        notif_status: NotifStatus::parse(&row.try_get::<String, _>("notif_status")?),
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        context,
        id: EventId::new(id),
    })
}

#[async_trait]
impl StepStore for Storage {
    async fn get(&self, namespace: &Namespace, field: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM drafts WHERE namespace = ? AND field = ?")
            .bind(namespace.as_str())
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read {namespace}.{field}"))?;
        Ok(value)
    }

    async fn set(&self, namespace: &Namespace, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO drafts (namespace, field, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(namespace, field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(namespace.as_str())
        .bind(field)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write {namespace}.{field}"))?;
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, field: &str) -> Result<()> {
        sqlx::query("DELETE FROM drafts WHERE namespace = ? AND field = ?")
            .bind(namespace.as_str())
            .bind(field)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete {namespace}.{field}"))?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        sqlx::query("DELETE FROM drafts WHERE namespace = ?")
            .bind(namespace.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete draft {namespace}"))?;
        Ok(())
    }

    async fn entries(&self, namespace: &Namespace) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT field, value FROM drafts WHERE namespace = ?")
            .bind(namespace.as_str())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to read draft {namespace}"))?;
        rows.into_iter()
            .map(|row| -> Result<(String, String)> {
                Ok((row.try_get("field")?, row.try_get("value")?))
            })
            .collect()
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT namespace FROM drafts ORDER BY namespace")
                .fetch_all(&self.pool)
                .await
                .context("failed to list draft namespaces")?;
        Ok(names.into_iter().map(Namespace::from_raw).collect())
    }

    /// One transaction: either every field lands or none do.
    async fn set_many(&self, namespace: &Namespace, entries: &[(String, String)]) -> Result<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start draft transaction")?;
        for (field, value) in entries {
            sqlx::query(
                "INSERT INTO drafts (namespace, field, value, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(namespace, field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(namespace.as_str())
            .bind(field)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write {namespace}.{field}; step not saved"))?;
        }
        tx.commit()
            .await
            .with_context(|| format!("failed to commit step write to {namespace}"))?;
        Ok(())
    }
}

#[async_trait]
impl EventFeed for Storage {
    async fn events_for_viewer(&self, viewer: &UserId) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            "SELECT id, viewer_id, event_type, status, notif_status, title, message, context, created_at
             FROM events
             WHERE viewer_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(viewer.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to load events for {viewer}"))?;
        rows.iter().map(event_from_row).collect()
    }

    async fn set_notif_status(&self, id: &EventId, status: NotifStatus) -> Result<()> {
        let result = sqlx::query("UPDATE events SET notif_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update event {id}"))?;
        if result.rows_affected() == 0 {
            bail!("no event with id {id}");
        }
        Ok(())
    }

    async fn set_status(&self, id: &EventId, status: EventStatus) -> Result<()> {
        let result = sqlx::query("UPDATE events SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update event {id}"))?;
        if result.rows_affected() == 0 {
            bail!("no event with id {id}");
        }
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(parent) = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
    else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == MEMORY_URL || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
