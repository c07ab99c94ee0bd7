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

//! two-tier cache & credential store (C3, spec §4.3). Tier 1 is
//! `hazard_common::store::TtlStore` (process memory); tier 2 is the
//! `kv_store` table via `Db`. Read order: memory, then durable, then miss.
//! Writes go to both tiers.

use crate::db::Db;
use hazard_common::store::TtlStore;
use hazard_sources::{CredentialStore, RawPayload};
use std::time::Duration;

fn scraper_key(source: &str, region_code: &str) -> String {
    format!("cache:scraper:{source}:{region_code}")
}

const WU_KEY_POOL_KEY: &str = "cache:wu:key_pool";
const WU_ACTIVE_KEY_KEY: &str = "cache:wu:active_key";

pub struct PayloadCache {
    memory: TtlStore<RawPayload>,
    db: Db,
}

impl PayloadCache {
    pub fn new(db: Db) -> Self {
        PayloadCache { memory: TtlStore::new(), db }
    }

    pub async fn get(&self, source: &str, region_code: &str) -> Option<RawPayload> {
        let key = scraper_key(source, region_code);
        if let Some(payload) = self.memory.get(&key) {
            return Some(payload);
        }
        match self.db.kv_get::<RawPayload>(&key).await {
            Ok(Some(payload)) => {
                self.memory.insert(key, payload.clone(), Duration::from_secs(3600));
                Some(payload)
            }
            _ => None,
        }
    }

    pub async fn put(&self, source: &str, region_code: &str, payload: &RawPayload, ttl: Duration) {
        let key = scraper_key(source, region_code);
        self.memory.insert(key.clone(), payload.clone(), ttl);
        let _ = self.db.kv_put(&key, payload, ttl.as_secs() as i64).await;
    }

    /// `reset_scraper_runtime(clear_cache=true)` per §6: flush both tiers.
    pub async fn clear_all(&self) {
        self.memory.remove_prefix("cache:scraper:");
        let _ = self.db.kv_remove_prefix("cache:scraper:").await;
    }
}

/// `CredentialStore` backing `weather_wu_api`'s key-discovery flow, wired
/// into the source registry so `hazard_sources` never depends on this crate
/// (spec §9's one-way read note).
pub struct DurableCredentialStore {
    memory: TtlStore<Vec<String>>,
    active_memory: TtlStore<String>,
    db: Db,
}

impl DurableCredentialStore {
    pub fn new(db: Db) -> Self {
        DurableCredentialStore { memory: TtlStore::new(), active_memory: TtlStore::new(), db }
    }
}

#[async_trait::async_trait]
impl CredentialStore for DurableCredentialStore {
    async fn get_key_pool(&self, source: &str) -> Vec<String> {
        let key = format!("{WU_KEY_POOL_KEY}:{source}");
        if let Some(pool) = self.memory.get(&key) {
            return pool;
        }
        match self.db.kv_get::<Vec<String>>(&key).await {
            Ok(Some(pool)) => {
                self.memory.insert(key, pool.clone(), Duration::from_secs(3600));
                pool
            }
            _ => Vec::new(),
        }
    }

    async fn set_key_pool(&self, source: &str, keys: Vec<String>, ttl: Duration) {
        let key = format!("{WU_KEY_POOL_KEY}:{source}");
        self.memory.insert(key.clone(), keys.clone(), ttl);
        let _ = self.db.kv_put(&key, &keys, ttl.as_secs() as i64).await;
    }

    async fn get_active_key(&self, source: &str) -> Option<String> {
        let key = format!("{WU_ACTIVE_KEY_KEY}:{source}");
        if let Some(k) = self.active_memory.get(&key) {
            return Some(k);
        }
        match self.db.kv_get::<String>(&key).await {
            Ok(Some(k)) => {
                self.active_memory.insert(key, k.clone(), Duration::from_secs(3600));
                Some(k)
            }
            _ => None,
        }
    }

    async fn set_active_key(&self, source: &str, key: String, ttl: Duration) {
        let cache_key = format!("{WU_ACTIVE_KEY_KEY}:{source}");
        self.active_memory.insert(cache_key.clone(), key.clone(), ttl);
        let _ = self.db.kv_put(&cache_key, &key, ttl.as_secs() as i64).await;
    }

    async fn invalidate_active_key(&self, source: &str) {
        let cache_key = format!("{WU_ACTIVE_KEY_KEY}:{source}");
        self.active_memory.remove(&cache_key);
        let _ = self.db.kv_remove(&cache_key).await;
    }
}
