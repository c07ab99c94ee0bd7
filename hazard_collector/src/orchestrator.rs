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

//! bounded-concurrency fan-out over the source registry (spec §4.2). Two
//! semaphores model the two caps in play: `collector_max_concurrency` bounds
//! the whole batch's in-flight fetches; `scraper_max_parallel_requests`
//! further narrows the scraper-style sources, which share a domain.

use crate::cache::PayloadCache;
use crate::db::Db;
use crate::{CollectionResult, RegionInput, SourceStatus, WarningSnapshot};
use futures::stream::{FuturesUnordered, StreamExt};
use hazard_sources::{DataSource, NormalizedObservation, RawPayload};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn is_scraper(source_name: &str) -> bool {
    source_name.ends_with("_scraper")
}

pub struct CollectionOrchestrator {
    sources: Arc<Vec<Box<dyn DataSource>>>,
    cache: Arc<PayloadCache>,
    db: Db,
    global_sem: Arc<tokio::sync::Semaphore>,
    scraper_sem: Arc<tokio::sync::Semaphore>,
    scraper_cache_ttl: Duration,
}

impl CollectionOrchestrator {
    pub fn new(
        sources: Arc<Vec<Box<dyn DataSource>>>,
        cache: Arc<PayloadCache>,
        db: Db,
        collector_max_concurrency: usize,
        scraper_max_parallel_requests: usize,
        scraper_cache_ttl: Duration,
    ) -> Self {
        CollectionOrchestrator {
            sources,
            cache,
            db,
            global_sem: Arc::new(tokio::sync::Semaphore::new(collector_max_concurrency.max(1))),
            scraper_sem: Arc::new(tokio::sync::Semaphore::new(scraper_max_parallel_requests.max(1))),
            scraper_cache_ttl,
        }
    }

    async fn fetch_one(&self, region: &RegionInput, source: &dyn DataSource, cancel: &CancellationToken) -> (String, RawPayload, bool) {
        let name = source.name().to_string();

        if let Some(cached) = self.cache.get(&name, &region.region_code).await {
            let mut hit = cached;
            hit.cache_hit = true;
            return (name, hit, true);
        }

        let _global_permit = self.global_sem.acquire().await.expect("semaphore not closed");
        let _scraper_permit = if is_scraper(&name) {
            Some(self.scraper_sem.acquire().await.expect("semaphore not closed"))
        } else {
            None
        };

        let raw = source.fetch(&region.region_code, &region.region_name, cancel).await;
        if raw.success && is_scraper(&name) {
            self.cache.put(&name, &region.region_code, &raw, self.scraper_cache_ttl).await;
        }
        (name, raw, false)
    }

    /// spec §4.2: per region, fan out across all registered sources,
    /// normalize on success, partition into success/errors per channel, and
    /// attach historical context for the fusion pipeline.
    pub async fn collect_batch(&self, batch: &[RegionInput], cancel: &CancellationToken, historical_window_years: i64) -> Vec<CollectionResult> {
        let mut pending = FuturesUnordered::new();
        for region in batch {
            for source in self.sources.iter() {
                pending.push(async move {
                    let (name, raw, cache_hit) = self.fetch_one(region, source.as_ref(), cancel).await;
                    (region.region_code.clone(), name, raw, cache_hit, source.as_ref())
                });
            }
        }

        let mut by_region: HashMap<String, (SourceStatus, HashMap<String, NormalizedObservation>)> =
            batch.iter().map(|r| (r.region_code.clone(), (SourceStatus::default(), HashMap::new()))).collect();

        while let Some((region_code, source_name, raw, _cache_hit, source)) = pending.next().await {
            let entry = by_region.entry(region_code).or_default();
            if raw.success {
                if let Some(obs) = source.normalize(&raw) {
                    entry.0.success.entry(source.channel().as_str().to_string()).or_default().push(source_name.clone());
                    entry.1.insert(source_name, obs);
                }
            } else if let Some(err) = raw.error {
                entry.0.errors.insert(source_name, err);
            }
        }

        let mut results = Vec::with_capacity(batch.len());
        for region in batch {
            let (source_status, observations) = by_region.remove(&region.region_code).unwrap_or_default();
            let historical_event_count = self.load_historical_event_count(&region.region_code, historical_window_years).await;
            let previous_warning_snapshot = self.load_previous_snapshot(&region.region_code).await;
            results.push(CollectionResult {
                region: region.clone(),
                observations,
                source_status,
                historical_event_count,
                previous_warning_snapshot,
            });
        }
        results
    }

    /// count of warnings of level >= yellow within the rolling window.
    async fn load_historical_event_count(&self, region_code: &str, window_years: i64) -> u32 {
        let cutoff = hazard_common::datetime::EpochMillis::now().millis() / 1000 - window_years * 365 * 24 * 3600;
        let row = sqlx::query("select count(*) as c from warnings where region_id = ? and created_at >= ? and level in ('yellow','orange','red')")
            .bind(region_code)
            .bind(cutoff)
            .fetch_one(self.db.pool())
            .await;

        match row {
            Ok(row) => row.try_get::<i64, _>("c").unwrap_or(0).max(0) as u32,
            Err(_) => 0,
        }
    }

    async fn load_previous_snapshot(&self, region_code: &str) -> Option<WarningSnapshot> {
        let row = sqlx::query("select level, reason, meteorology, confidence, created_at from warnings where region_id = ? order by created_at desc limit 1")
            .bind(region_code)
            .fetch_optional(self.db.pool())
            .await
            .ok()??;

        let level: String = row.try_get("level").ok()?;
        let confidence: f64 = row.try_get("confidence").ok()?;
        let created_at: i64 = row.try_get("created_at").ok()?;
        let meteorology_raw: String = row.try_get("meteorology").ok()?;
        let meteorology: serde_json::Value = serde_json::from_str(&meteorology_raw).ok()?;
        let adjusted_score = meteorology
            .get("confidence_breakdown")
            .and_then(|cb| cb.get("components"))
            .and_then(|c| c.get("adjusted_score"))
            .and_then(|v| v.as_f64());

        Some(WarningSnapshot { level, confidence, adjusted_score, created_at })
    }
}
