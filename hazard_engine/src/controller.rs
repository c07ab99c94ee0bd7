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

//! Run Controller (spec §4.5, component C5): owns the single in-flight run,
//! the durable `run:lock` heartbeat, and the batching loop that carries
//! selected regions through collection, fusion, persistence, and delta
//! publication. Process-lifetime singletons — the source registry and its
//! shared `ScraperGuard`, the payload cache, the delta publisher — are built
//! once at `RunController::new` and outlive every run; only the guard's
//! per-run URL-collision map and the controller's own `RunState` reset at
//! the start of each run.

use crate::delta::DeltaPublisher;
use crate::region::{load_all, Region};
use crate::run_state::{run_error, RunMode, RunState};
use crate::selector::select_regions;
use hazard_collector::cache::PayloadCache;
use hazard_collector::db::Db;
use hazard_collector::orchestrator::CollectionOrchestrator;
use hazard_collector::{CollectionResult, RegionInput};
use hazard_config::EngineConfig;
use hazard_fusion::llm::LlmClient;
use hazard_sources::registry::{build_registry, SourceRegistry};
use hazard_sources::HazardSourceError;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RUN_LOCK_KEY: &str = "run:lock";
const MAX_REMEMBERED_RUNS: usize = 3;

fn now_millis() -> i64 {
    hazard_common::datetime::EpochMillis::now().millis()
}

pub struct TriggerOptions {
    pub mode: RunMode,
    pub region_limit: Option<usize>,
    pub force_llm: bool,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        TriggerOptions { mode: RunMode::Full, region_limit: None, force_llm: false }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub state: Option<RunState>,
}

pub struct RunController {
    config: EngineConfig,
    db: Db,
    cache: Arc<PayloadCache>,
    registry: SourceRegistry,
    delta: Arc<DeltaPublisher>,
    llm_client: Option<Arc<dyn LlmClient>>,
    active: Mutex<Option<RunState>>,
    cancel: Mutex<Option<CancellationToken>>,
    last_collections: Mutex<VecDeque<Vec<CollectionResult>>>,
}

impl RunController {
    pub fn new(
        config: EngineConfig,
        db: Db,
        credentials: Arc<dyn hazard_sources::CredentialStore>,
        llm_client: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self, HazardSourceError> {
        let registry = build_registry(&config, credentials)?;
        let cache = Arc::new(PayloadCache::new(db.clone()));
        Ok(RunController {
            config,
            db,
            cache,
            registry,
            delta: Arc::new(DeltaPublisher::new(256)),
            llm_client,
            active: Mutex::new(None),
            cancel: Mutex::new(None),
            last_collections: Mutex::new(VecDeque::with_capacity(MAX_REMEMBERED_RUNS)),
        })
    }

    /// builds a controller around an explicit source list instead of
    /// `build_registry`'s configuration-driven adapters, for scenario tests
    /// that need deterministic per-source success/failure.
    pub fn with_sources(config: EngineConfig, db: Db, sources: Vec<Box<dyn hazard_sources::DataSource>>, llm_client: Option<Arc<dyn LlmClient>>) -> Self {
        let cache = Arc::new(PayloadCache::new(db.clone()));
        let scraper_guard = Arc::new(hazard_sources::scraper_guard::ScraperGuard::new(
            config.scraper_allowed_domains.clone(),
            config.city_level_only,
            Duration::from_secs_f64(config.scraper_request_interval_seconds),
            Duration::from_secs(config.scraper_request_window_seconds),
            config.scraper_max_requests_per_window,
            Duration::from_secs(config.scraper_cooldown_base_seconds),
            Duration::from_secs(config.scraper_cooldown_max_seconds),
        ));
        RunController {
            config,
            db,
            cache,
            registry: SourceRegistry { sources: Arc::new(sources), scraper_guard },
            delta: Arc::new(DeltaPublisher::new(256)),
            llm_client,
            active: Mutex::new(None),
            cancel: Mutex::new(None),
            last_collections: Mutex::new(VecDeque::with_capacity(MAX_REMEMBERED_RUNS)),
        }
    }

    pub fn subscribe_deltas(&self) -> tokio::sync::broadcast::Receiver<crate::delta::Delta> {
        self.delta.subscribe()
    }

    /// fire-and-forget trigger: spawns the run loop and returns immediately
    /// with the request id the caller can poll `status()` with.
    pub async fn trigger_async(self: &Arc<Self>, request_id: String, opts: TriggerOptions) -> Result<String, String> {
        self.acquire_lock(&request_id, opts.mode).await?;
        let this = Arc::clone(self);
        let req = request_id.clone();
        tokio::spawn(async move {
            this.run(req, opts).await;
        });
        Ok(request_id)
    }

    /// same as `trigger_async` but awaits completion, for CLI/test callers
    /// that want a synchronous result.
    pub async fn trigger_sync(self: &Arc<Self>, request_id: String, opts: TriggerOptions) -> Result<RunState, String> {
        self.acquire_lock(&request_id, opts.mode).await?;
        self.run(request_id, opts).await;
        self.active.lock().await.clone().ok_or_else(|| "run vanished".to_string())
    }

    async fn acquire_lock(&self, request_id: &str, mode: RunMode) -> Result<(), String> {
        let existing: Option<RunState> = self.db.kv_get(RUN_LOCK_KEY).await.map_err(|e| e.to_string())?;
        if let Some(existing) = &existing {
            if !existing.is_heartbeat_stale(now_millis(), self.config.heartbeat_timeout_seconds) {
                return Err(run_error::ALREADY_RUNNING.to_string());
            }
            warn!(stale_request_id = %existing.request_id, "evicting stale run lock");
        }

        let state = RunState::new(request_id.to_string(), mode, now_millis());
        self.db.kv_put(RUN_LOCK_KEY, &state, -1).await.map_err(|e| e.to_string())?;
        *self.active.lock().await = Some(state);
        *self.cancel.lock().await = Some(CancellationToken::new());
        Ok(())
    }

    async fn heartbeat(&self, mutate: impl FnOnce(&mut RunState)) {
        let mut guard = self.active.lock().await;
        if let Some(state) = guard.as_mut() {
            mutate(state);
            state.heartbeat_at = now_millis();
            let _ = self.db.kv_put(RUN_LOCK_KEY, state, -1).await;
        }
    }

    async fn finish(&self, last_error: Option<String>, processed: usize) {
        let mut guard = self.active.lock().await;
        if let Some(state) = guard.as_mut() {
            state.last_error = last_error;
            state.last_finished_at = Some(now_millis());
            state.last_processed_regions = Some(processed);
            let _ = self.db.kv_put(RUN_LOCK_KEY, state, -1).await;
        }
        let _ = self.db.kv_remove(RUN_LOCK_KEY).await;
        *self.cancel.lock().await = None;
    }

    async fn run(&self, request_id: String, opts: TriggerOptions) {
        self.registry.scraper_guard.reset_run_scoped_state();

        let cancel = self.cancel.lock().await.clone().unwrap_or_else(CancellationToken::new);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.workflow_max_runtime_seconds);

        let all_regions = match load_all(&self.db).await {
            Ok(r) => r,
            Err(e) => {
                self.finish(Some(run_error::internal(&format!("region_load:{e}"))), 0).await;
                return;
            }
        };
        let total_regions = all_regions.len();
        let selected = select_regions(&all_regions, opts.mode, &request_id, opts.region_limit, &self.config);
        let selected_count = selected.len();

        self.heartbeat(|s| {
            s.total_regions = total_regions;
            s.selected_regions = selected_count;
        })
        .await;

        let batches = group_into_batches(&selected, self.config.batch_size());
        let orchestrator = CollectionOrchestrator::new(
            self.registry.sources.clone(),
            self.cache.clone(),
            self.db.clone(),
            self.config.collector_max_concurrency,
            self.config.scraper_max_parallel_requests,
            Duration::from_secs(self.config.scraper_cache_minutes * 60),
        );

        let mut processed = 0usize;
        let mut last_error: Option<String> = None;
        let mut remembered: Vec<CollectionResult> = Vec::new();

        for batch in batches {
            if cancel.is_cancelled() {
                last_error = Some(run_error::MANUAL_ABORT.to_string());
                break;
            }
            if { self.active.lock().await.as_ref().map(|s| s.abort_requested).unwrap_or(false) } {
                last_error = Some(run_error::MANUAL_ABORT.to_string());
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                last_error = Some(run_error::partial_timeout(self.config.workflow_max_runtime_seconds));
                break;
            }

            let inputs: Vec<RegionInput> = batch.iter().map(region_to_input).collect();
            let collected = orchestrator.collect_batch(&inputs, &cancel, self.config.historical_pressure_window_years).await;

            let raw_decisions = hazard_fusion::run_pipeline(&collected, &self.config, opts.force_llm, self.llm_client.as_deref()).await;
            // spec §7: a region for which every source failed retains its
            // previous WarningRecord rather than being overwritten with a
            // fabricated decision computed from no data.
            let decisions: Vec<hazard_fusion::Decision> = collected
                .iter()
                .zip(raw_decisions)
                .filter_map(|(collection, decision)| {
                    let all_sources_failed = collection.source_status.success.values().all(|sources| sources.is_empty());
                    if all_sources_failed && collection.previous_warning_snapshot.is_some() {
                        None
                    } else {
                        Some(decision)
                    }
                })
                .collect();

            let created_at = now_millis() / 1000;
            if let Err(e) = crate::persist::commit_batch(&self.db, &decisions, created_at, "hazard_engine").await {
                last_error = Some(run_error::internal(&format!("persist:{e}")));
                remembered.extend(collected);
                break;
            }

            self.delta.publish(created_at, &decisions);
            processed += batch.len();
            remembered.extend(collected);

            self.heartbeat(|s| {
                s.processed_regions = processed;
            })
            .await;
        }

        self.remember_collection(remembered).await;
        self.finish(last_error, processed).await;
        info!(request_id = %request_id, processed, "run finished");
    }

    async fn remember_collection(&self, collection: Vec<CollectionResult>) {
        if collection.is_empty() {
            return;
        }
        let mut guard = self.last_collections.lock().await;
        if guard.len() >= MAX_REMEMBERED_RUNS {
            guard.pop_front();
        }
        guard.push_back(collection);
    }

    pub async fn status(&self) -> RunStatus {
        let guard = self.active.lock().await;
        match guard.as_ref() {
            Some(state) => RunStatus { running: state.last_finished_at.is_none(), state: Some(state.clone()) },
            None => RunStatus { running: false, state: None },
        }
    }

    /// requests cooperative cancellation at the next batch boundary or
    /// I/O-suspension point; does not forcibly kill in-flight fetches.
    pub async fn abort(&self) {
        if let Some(token) = self.cancel.lock().await.as_ref() {
            token.cancel();
        }
        let mut guard = self.active.lock().await;
        if let Some(state) = guard.as_mut() {
            state.abort_requested = true;
        }
    }

    /// cooperative process shutdown: aborts an in-flight run the same way
    /// `abort` does, then releases the durable lock directly instead of
    /// waiting for `run`'s own cleanup, so a process restart never has to
    /// wait out `heartbeat_timeout_seconds` against its own last run.
    pub async fn shutdown(&self) {
        self.abort().await;
        let _ = self.db.kv_remove(RUN_LOCK_KEY).await;
    }

    /// releases a stuck lock unconditionally; meant for operator recovery,
    /// not for aborting a healthy run (use `abort` for that).
    pub async fn reset(&self) -> Result<(), String> {
        self.db.kv_remove(RUN_LOCK_KEY).await.map_err(|e| e.to_string())?;
        *self.active.lock().await = None;
        *self.cancel.lock().await = None;
        Ok(())
    }

    pub async fn debug_last_collection(&self) -> Vec<Vec<CollectionResult>> {
        self.last_collections.lock().await.iter().cloned().collect()
    }

    /// `reset_scraper_runtime(clear_cache)`: always clears the rate-limit and
    /// cooldown tables (process-wide, spec §5), and flushes the two-tier
    /// payload cache only when the caller asks for it.
    pub async fn reset_scraper_runtime(&self, clear_cache: bool) {
        self.registry.scraper_guard.clear_cooldowns();
        if clear_cache {
            self.cache.clear_all().await;
        }
    }

    /// spec §6: synthesizes a plausible `Decision` for every region and
    /// pushes the batch through the delta publisher (C6) — never touches a
    /// source or the LLM, and never persists, so the `regions`/`warnings`
    /// tables are left untouched.
    pub async fn debug_randomize(&self) -> Result<(), String> {
        use rand::seq::SliceRandom;
        use rand::Rng;

        let regions = load_all(&self.db).await.map_err(|e| e.to_string())?;
        let mut rng = rand::thread_rng();
        let levels = [hazard_fusion::Level::Green, hazard_fusion::Level::Yellow, hazard_fusion::Level::Orange, hazard_fusion::Level::Red];

        let decisions: Vec<hazard_fusion::Decision> = regions
            .iter()
            .map(|region| {
                let level = *levels.choose(&mut rng).expect("levels is non-empty");
                let confidence = rng.gen_range(0.5..0.95);
                hazard_fusion::Decision {
                    region_code: region.code.clone(),
                    region_name: region.name.clone(),
                    level,
                    reason: "synthetic reading injected via debug_randomize".to_string(),
                    confidence,
                    merged_observation: hazard_fusion::MeteorologyObservationPlus::default(),
                    source_status: hazard_collector::SourceStatus::default(),
                    confidence_breakdown: hazard_fusion::ConfidenceBreakdown::default(),
                    hazard_candidates: vec![],
                }
            })
            .collect();

        self.delta.publish(now_millis() / 1000, &decisions);
        Ok(())
    }
}

fn region_to_input(r: &Region) -> RegionInput {
    RegionInput { region_code: r.code.clone(), region_name: r.name.clone(), lat: r.lat, lon: r.lon }
}

/// groups regions by administrative prefix (first two characters of the
/// region code) before chunking, per spec §4.5, so a batch tends to land
/// within a single scraper-source's geography rather than scattering across
/// every cooldown domain at once.
fn group_into_batches(regions: &[Region], batch_size: usize) -> Vec<Vec<Region>> {
    let mut grouped: std::collections::BTreeMap<String, Vec<Region>> = std::collections::BTreeMap::new();
    for region in regions {
        let prefix = region.code.chars().take(2).collect::<String>();
        grouped.entry(prefix).or_default().push(region.clone());
    }

    let mut flattened: Vec<Region> = Vec::with_capacity(regions.len());
    for (_, mut group) in grouped {
        group.sort_by(|a, b| a.code.cmp(&b.code));
        flattened.append(&mut group);
    }

    flattened.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::upsert_region;

    struct NullCreds;
    #[async_trait::async_trait]
    impl hazard_sources::CredentialStore for NullCreds {
        async fn get_key_pool(&self, _source: &str) -> Vec<String> {
            Vec::new()
        }
        async fn set_key_pool(&self, _source: &str, _keys: Vec<String>, _ttl: Duration) {}
        async fn get_active_key(&self, _source: &str) -> Option<String> {
            None
        }
        async fn set_active_key(&self, _source: &str, _key: String, _ttl: Duration) {}
        async fn invalidate_active_key(&self, _source: &str) {}
    }

    async fn seeded_controller(regions: &[&str]) -> Arc<RunController> {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        for code in regions {
            upsert_region(&db, &Region { code: (*code).into(), name: (*code).into(), lat: None, lon: None, risk_level: "green".into(), last_updated_at: 0 }).await.unwrap();
        }
        let config = EngineConfig::default();
        Arc::new(RunController::new(config, db, Arc::new(NullCreds), None).unwrap())
    }

    #[tokio::test]
    async fn trigger_sync_processes_every_region_with_all_sources_disabled() {
        let controller = seeded_controller(&["R001", "R002"]).await;
        let state = controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();
        assert_eq!(state.total_regions, 2);
        assert_eq!(state.selected_regions, 2);
        assert_eq!(state.last_processed_regions, Some(2));
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn second_trigger_while_first_is_running_is_rejected() {
        let controller = seeded_controller(&["R001"]).await;
        controller.acquire_lock("req-1", RunMode::Full).await.unwrap();
        let err = controller.acquire_lock("req-2", RunMode::Full).await.unwrap_err();
        assert_eq!(err, run_error::ALREADY_RUNNING);
    }

    #[tokio::test]
    async fn reset_releases_a_stuck_lock() {
        let controller = seeded_controller(&["R001"]).await;
        controller.acquire_lock("req-1", RunMode::Full).await.unwrap();
        controller.reset().await.unwrap();
        let status = controller.status().await;
        assert!(!status.running);
        controller.acquire_lock("req-2", RunMode::Full).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_releases_the_lock_without_waiting_on_heartbeat_timeout() {
        let controller = seeded_controller(&["R001"]).await;
        controller.acquire_lock("req-1", RunMode::Full).await.unwrap();
        controller.shutdown().await;
        controller.acquire_lock("req-2", RunMode::Full).await.unwrap();
    }

    #[tokio::test]
    async fn debug_randomize_publishes_without_touching_persisted_state() {
        let controller = seeded_controller(&["R001", "R002"]).await;
        let mut rx = controller.subscribe_deltas();

        controller.debug_randomize().await.unwrap();

        let delta = rx.recv().await.unwrap();
        assert_eq!(delta.results.len(), 2);

        let regions = load_all(&controller.db).await.unwrap();
        assert!(regions.iter().all(|r| r.risk_level == "green"), "debug_randomize must never persist");
    }
}

