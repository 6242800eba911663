//! SQLite-backed resource store.

use std::collections::BTreeMap;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{
    Direction, LinkChange, LinkType, PropValue, Resource, ResourceStore, ResourceType,
    ResourceUpdate, UpdateTarget,
};
use crate::ids::ResourceId;
use crate::{Error, Result};

/// Persistent resource store.
///
/// Property values are stored as their JSON encoding so equality lookups
/// can be answered by the database.
pub struct SqliteResourceStore {
    pool: SqlitePool,
}

impl SqliteResourceStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_type TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS props (
                resource_id INTEGER NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (resource_id, name)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS links (
                from_id INTEGER NOT NULL,
                link_type TEXT NOT NULL,
                to_id INTEGER NOT NULL,
                PRIMARY KEY (from_id, link_type, to_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Lookups by property value (entry ids, record keys, addresses)
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_props_value ON props(name, value)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_id, link_type)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Count resources per type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_by_type(&self) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            r"
            SELECT resource_type, COUNT(*) AS total
            FROM resources
            GROUP BY resource_type
            ORDER BY resource_type
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("resource_type"), row.get::<i64, _>("total")))
            .collect())
    }
}

impl ResourceStore for SqliteResourceStore {
    async fn load(&self, id: ResourceId) -> Result<Option<Resource>> {
        let row = sqlx::query(r"SELECT resource_type FROM resources WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let type_name: String = row.get("resource_type");
        let resource_type = ResourceType::parse(&type_name)
            .ok_or_else(|| Error::Config(format!("unknown resource type {type_name}")))?;

        let rows = sqlx::query(r"SELECT name, value FROM props WHERE resource_id = ?")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?;
        let mut props = BTreeMap::new();
        for row in rows {
            let value: String = row.get("value");
            props.insert(row.get("name"), serde_json::from_str(&value)?);
        }

        Ok(Some(Resource {
            id,
            resource_type,
            props,
        }))
    }

    async fn find_by_prop(
        &self,
        resource_type: ResourceType,
        name: &str,
        value: &PropValue,
    ) -> Result<Vec<ResourceId>> {
        let encoded = serde_json::to_string(value)?;
        let rows = sqlx::query(
            r"
            SELECT r.id
            FROM resources r
            JOIN props p ON p.resource_id = r.id
            WHERE r.resource_type = ? AND p.name = ? AND p.value = ?
            ORDER BY r.id
            ",
        )
        .bind(resource_type.as_str())
        .bind(name)
        .bind(encoded)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ResourceId(row.get::<i64, _>("id")))
            .collect())
    }

    async fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceId>> {
        let rows = sqlx::query(r"SELECT id FROM resources WHERE resource_type = ? ORDER BY id")
            .bind(resource_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ResourceId(row.get::<i64, _>("id")))
            .collect())
    }

    async fn links(
        &self,
        id: ResourceId,
        link: LinkType,
        direction: Direction,
    ) -> Result<Vec<ResourceId>> {
        let sql = match direction {
            Direction::Outgoing => {
                r"SELECT to_id AS other FROM links WHERE from_id = ? AND link_type = ? ORDER BY to_id"
            }
            Direction::Incoming => {
                r"SELECT from_id AS other FROM links WHERE to_id = ? AND link_type = ? ORDER BY from_id"
            }
        };
        let rows = sqlx::query(sql)
            .bind(id.0)
            .bind(link.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ResourceId(row.get::<i64, _>("other")))
            .collect())
    }

    async fn commit(&self, update: ResourceUpdate) -> Result<ResourceId> {
        let mut tx = self.pool.begin().await?;

        for change in update.link_changes() {
            let other = match change {
                LinkChange::Add(_, other)
                | LinkChange::Remove(_, other)
                | LinkChange::AddIncoming(_, other) => *other,
            };
            let exists = sqlx::query(r"SELECT 1 FROM resources WHERE id = ?")
                .bind(other.0)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(Error::ResourceNotFound(other));
            }
        }

        let id = match update.target() {
            UpdateTarget::New(resource_type) => {
                let result = sqlx::query(r"INSERT INTO resources (resource_type) VALUES (?)")
                    .bind(resource_type.as_str())
                    .execute(&mut *tx)
                    .await?;
                ResourceId(result.last_insert_rowid())
            }
            UpdateTarget::Existing(id) => {
                let exists = sqlx::query(r"SELECT 1 FROM resources WHERE id = ?")
                    .bind(id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
                if exists.is_none() {
                    return Err(Error::ResourceNotFound(id));
                }
                id
            }
        };

        for name in update.deletes() {
            sqlx::query(r"DELETE FROM props WHERE resource_id = ? AND name = ?")
                .bind(id.0)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for (name, value) in update.sets() {
            sqlx::query(
                r"
                INSERT INTO props (resource_id, name, value)
                VALUES (?, ?, ?)
                ON CONFLICT(resource_id, name) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(id.0)
            .bind(name)
            .bind(serde_json::to_string(value)?)
            .execute(&mut *tx)
            .await?;
        }

        for change in update.link_changes() {
            let (sql, from, link, to) = match *change {
                LinkChange::Add(link, to) => (
                    r"INSERT OR IGNORE INTO links (from_id, link_type, to_id) VALUES (?, ?, ?)",
                    id,
                    link,
                    to,
                ),
                LinkChange::AddIncoming(link, from) => (
                    r"INSERT OR IGNORE INTO links (from_id, link_type, to_id) VALUES (?, ?, ?)",
                    from,
                    link,
                    id,
                ),
                LinkChange::Remove(link, to) => (
                    r"DELETE FROM links WHERE from_id = ? AND link_type = ? AND to_id = ?",
                    id,
                    link,
                    to,
                ),
            };
            sqlx::query(sql)
                .bind(from.0)
                .bind(link.as_str())
                .bind(to.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn delete(&self, id: ResourceId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(r"DELETE FROM links WHERE from_id = ? OR to_id = ?")
            .bind(id.0)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM props WHERE resource_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM resources WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
