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
//! generic, typed in-memory TTL store. Grounded in the teacher's
//! `shared_store` module: a synchronized map behind an opaque interface so
//! callers never hold the lock across an `.await`. Unlike the teacher's
//! version this one is TTL-aware, since it backs the first tier of the
//! source-payload cache (§4.3).

use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

pub struct TtlStore<V: Clone> {
    map: DashMap<String, Entry<V>>,
}

impl<V: Clone> TtlStore<V> {
    pub fn new() -> Self {
        TtlStore { map: DashMap::new() }
    }

    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        self.map.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.map.get(key)?;
        if entry.stored_at.elapsed() <= entry.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn remove(&self, key: &str) {
        self.map.remove(key);
    }

    pub fn remove_prefix(&self, prefix: &str) {
        self.map.retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl<V: Clone> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
