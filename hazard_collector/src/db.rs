/*
 * Copyright © 2026, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “hazard-engine” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! durable backing: `regions`/`warnings` per spec §6, plus a generic
//! `kv_store` table that carries the durable tier of §4.3's two-tier cache
//! and the run lock (`run:lock`).

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(8).connect(url).await?;
        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            create table if not exists regions (
                code text primary key,
                name text not null,
                lat real,
                lon real,
                risk_level text not null default 'green',
                last_updated_at integer not null default 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            create table if not exists warnings (
                id integer primary key autoincrement,
                region_id text not null,
                level text not null,
                reason text not null,
                meteorology text not null,
                confidence real not null,
                created_at integer not null,
                source text not null
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("create index if not exists idx_warnings_region on warnings(region_id, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            create table if not exists kv_store (
                key text primary key,
                value text not null,
                stored_at integer not null,
                ttl_seconds integer not null
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// raw get honoring TTL; returns None on miss or expiry.
    pub async fn kv_get_raw(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("select value, stored_at, ttl_seconds from kv_store where key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };

        let stored_at: i64 = row.try_get("stored_at")?;
        let ttl_seconds: i64 = row.try_get("ttl_seconds")?;
        let now = hazard_common::datetime::EpochMillis::now().millis() / 1000;
        if ttl_seconds >= 0 && now - stored_at > ttl_seconds {
            return Ok(None);
        }
        Ok(Some(row.try_get("value")?))
    }

    pub async fn kv_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn kv_put<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: i64) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = hazard_common::datetime::EpochMillis::now().millis() / 1000;
        sqlx::query(
            "insert into kv_store (key, value, stored_at, ttl_seconds) values (?, ?, ?, ?)
             on conflict(key) do update set value = excluded.value, stored_at = excluded.stored_at, ttl_seconds = excluded.ttl_seconds",
        )
        .bind(key)
        .bind(raw)
        .bind(now)
        .bind(ttl_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn kv_remove(&self, key: &str) -> Result<()> {
        sqlx::query("delete from kv_store where key = ?").bind(key).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn kv_remove_prefix(&self, prefix: &str) -> Result<()> {
        sqlx::query("delete from kv_store where key like ? || '%'").bind(prefix).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kv_roundtrip_and_ttl_expiry() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        db.kv_put("k1", &"hello".to_string(), 60).await.unwrap();
        let v: Option<String> = db.kv_get("k1").await.unwrap();
        assert_eq!(v, Some("hello".to_string()));

        db.kv_put("k2", &"gone".to_string(), -1).await.unwrap();
        // negative ttl is treated as "no expiry" guard disabled; use 0 with a
        // manufactured stale stored_at instead to exercise expiry precisely
        // in the cache-layer tests, which control time more directly.
    }

    #[tokio::test]
    async fn remove_prefix_scopes_correctly() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        db.kv_put("cache:a:1", &1, 60).await.unwrap();
        db.kv_put("cache:b:1", &2, 60).await.unwrap();
        db.kv_remove_prefix("cache:a:").await.unwrap();
        assert_eq!(db.kv_get::<i32>("cache:a:1").await.unwrap(), None);
        assert_eq!(db.kv_get::<i32>("cache:b:1").await.unwrap(), Some(2));
    }
}
