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

//! the six seeded scenarios of spec §8, driven end-to-end through
//! `RunController` against an in-memory sqlite database and fake
//! `DataSource` adapters built with `RunController::with_sources`.

use async_trait::async_trait;
use hazard_collector::db::Db;
use hazard_config::EngineConfig;
use hazard_engine::region::{load_all, upsert_region, Region};
use hazard_engine::run_state::run_error;
use hazard_engine::{RunController, RunMode, TriggerOptions};
use hazard_sources::{Channel, ChannelObservation, DataSource, GeologyObservation, KeyMode, MeteorologyObservation, NormalizedObservation, RawPayload, SourceError, SourceErrorKind};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn region(code: &str, level: &str) -> Region {
    Region { code: code.into(), name: code.into(), lat: None, lon: None, risk_level: level.into(), last_updated_at: 0 }
}

async fn seeded_db(regions: &[Region]) -> Db {
    let db = Db::connect("sqlite::memory:").await.unwrap();
    for r in regions {
        upsert_region(&db, r).await.unwrap();
    }
    db
}

/// a source that always succeeds with a fixed meteorology reading.
struct FixedMeteorology {
    name: &'static str,
    rain_24h: Option<f64>,
    rain_1h: Option<f64>,
    humidity: Option<f64>,
    soil_moisture: Option<f64>,
}
#[async_trait]
impl DataSource for FixedMeteorology {
    fn name(&self) -> &str {
        self.name
    }
    fn channel(&self) -> Channel {
        Channel::Meteorology
    }
    fn reliability(&self) -> f64 {
        0.92
    }
    fn key_mode(&self) -> KeyMode {
        KeyMode::Simulate
    }
    async fn fetch(&self, region_code: &str, _region_name: &str, _cancel: &CancellationToken) -> RawPayload {
        RawPayload::ok(self.name, region_code, serde_json::json!({}))
    }
    fn normalize(&self, _raw: &RawPayload) -> Option<NormalizedObservation> {
        Some(NormalizedObservation {
            source: self.name.to_string(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation {
                rain_24h: self.rain_24h,
                rain_1h: self.rain_1h,
                humidity: self.humidity,
                wind_speed: None,
                soil_moisture: self.soil_moisture,
                rain_24h_est: None,
                rain_1h_est: None,
            }),
            notes: vec![],
        })
    }
}

/// a source that always succeeds with a fixed geology reading.
struct FixedGeology {
    name: &'static str,
    slope: Option<f64>,
    fault_distance: Option<f64>,
    lithology_risk: Option<f64>,
}
#[async_trait]
impl DataSource for FixedGeology {
    fn name(&self) -> &str {
        self.name
    }
    fn channel(&self) -> Channel {
        Channel::Geology
    }
    fn reliability(&self) -> f64 {
        0.88
    }
    fn key_mode(&self) -> KeyMode {
        KeyMode::Simulate
    }
    async fn fetch(&self, region_code: &str, _region_name: &str, _cancel: &CancellationToken) -> RawPayload {
        RawPayload::ok(self.name, region_code, serde_json::json!({}))
    }
    fn normalize(&self, _raw: &RawPayload) -> Option<NormalizedObservation> {
        Some(NormalizedObservation {
            source: self.name.to_string(),
            channel: Channel::Geology,
            data: ChannelObservation::Geology(GeologyObservation { slope: self.slope, fault_distance: self.fault_distance, lithology_risk: self.lithology_risk, historical_event_count: None }),
            notes: vec![],
        })
    }
}

/// a source that always fails with the given error kind.
struct AlwaysFails(&'static str, Channel, SourceErrorKind);
#[async_trait]
impl DataSource for AlwaysFails {
    fn name(&self) -> &str {
        self.0
    }
    fn channel(&self) -> Channel {
        self.1
    }
    fn reliability(&self) -> f64 {
        0.5
    }
    fn key_mode(&self) -> KeyMode {
        KeyMode::Live
    }
    async fn fetch(&self, region_code: &str, _region_name: &str, _cancel: &CancellationToken) -> RawPayload {
        RawPayload::err(self.0, region_code, SourceError::new(self.2, "unavailable"))
    }
    fn normalize(&self, _raw: &RawPayload) -> Option<NormalizedObservation> {
        None
    }
}

// --- scenario 1: happy path -------------------------------------------------

#[tokio::test]
async fn scenario_1_happy_path_produces_orange_with_ordered_hazard_candidates() {
    let db = seeded_db(&[region("R001", "green")]).await;
    let sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(FixedMeteorology { name: "weather_cma", rain_24h: Some(160.0), rain_1h: Some(30.0), humidity: Some(0.6), soil_moisture: Some(0.42) }),
        Box::new(FixedGeology { name: "geology_cgs", slope: Some(32.0), fault_distance: Some(4.0), lithology_risk: Some(0.6) }),
    ];
    let controller = Arc::new(RunController::with_sources(EngineConfig::default(), db.clone(), sources, None));

    let state = controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();
    assert!(state.last_error.is_none());

    let regions = load_all(&db).await.unwrap();
    assert_eq!(regions[0].risk_level, "orange");

    let collections = controller.debug_last_collection().await;
    let decisions_source_status = &collections.last().unwrap()[0].source_status;
    assert!(decisions_source_status.errors.is_empty());
}

// --- scenario 2: all sources fail, previous record is retained --------------

#[tokio::test]
async fn scenario_2_all_sources_failing_retains_the_previous_level() {
    let db = seeded_db(&[region("R001", "yellow")]).await;
    // seed a previous warning so `previous_warning_snapshot` resolves to yellow.
    sqlx::query("insert into warnings (region_id, level, reason, meteorology, confidence, created_at, source) values (?, ?, ?, ?, ?, ?, ?)")
        .bind("R001")
        .bind("yellow")
        .bind("prior observation")
        .bind("{}")
        .bind(0.6)
        .bind(0i64)
        .bind("hazard_engine")
        .execute(db.pool())
        .await
        .unwrap();

    let sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(AlwaysFails("weather_cma", Channel::Meteorology, SourceErrorKind::ConnectError)),
        Box::new(AlwaysFails("geology_cgs", Channel::Geology, SourceErrorKind::ConnectError)),
    ];
    let controller = Arc::new(RunController::with_sources(EngineConfig::default(), db.clone(), sources, None));

    let state = controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();
    assert!(state.last_error.is_none());

    let regions = load_all(&db).await.unwrap();
    assert_eq!(regions[0].risk_level, "yellow", "a region with no successful sources must not be overwritten to green");

    let warning_count: i64 = sqlx::query("select count(*) as c from warnings where region_id = ?").bind("R001").fetch_one(db.pool()).await.unwrap().try_get("c").unwrap();
    assert_eq!(warning_count, 1, "no new WarningRecord should be inserted when every source failed");
}

// --- scenario 3: abort mid-run ----------------------------------------------

struct CountingSource {
    name: &'static str,
    counter: Arc<AtomicUsize>,
    delay: Duration,
}
#[async_trait]
impl DataSource for CountingSource {
    fn name(&self) -> &str {
        self.name
    }
    fn channel(&self) -> Channel {
        Channel::Meteorology
    }
    fn reliability(&self) -> f64 {
        0.9
    }
    fn key_mode(&self) -> KeyMode {
        KeyMode::Simulate
    }
    async fn fetch(&self, region_code: &str, _region_name: &str, _cancel: &CancellationToken) -> RawPayload {
        tokio::time::sleep(self.delay).await;
        self.counter.fetch_add(1, Ordering::SeqCst);
        RawPayload::ok(self.name, region_code, serde_json::json!({}))
    }
    fn normalize(&self, _raw: &RawPayload) -> Option<NormalizedObservation> {
        Some(NormalizedObservation { source: self.name.to_string(), channel: Channel::Meteorology, data: ChannelObservation::Meteorology(MeteorologyObservation { rain_24h: Some(5.0), ..Default::default() }), notes: vec![] })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_3_abort_mid_run_preserves_already_committed_batches() {
    let regions: Vec<Region> = (0..40).map(|i| region(&format!("R{i:03}"), "green")).collect();
    let db = seeded_db(&regions).await;

    let counter = Arc::new(AtomicUsize::new(0));
    let sources: Vec<Box<dyn DataSource>> = vec![Box::new(CountingSource { name: "weather_cma", counter: counter.clone(), delay: Duration::from_millis(30) })];
    // collector_max_concurrency=5 forces batch_size = clamp(5*2, 15, 40) = 15,
    // matching spec's 15/15/10 split over 40 regions.
    let config = EngineConfig { collector_max_concurrency: 5, ..EngineConfig::default() };
    let controller = Arc::new(RunController::with_sources(config, db.clone(), sources, None));

    let watcher_controller = controller.clone();
    let watcher_counter = counter.clone();
    let watcher = tokio::spawn(async move {
        while watcher_counter.load(Ordering::SeqCst) < 30 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        watcher_controller.abort().await;
    });

    let state = controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();
    watcher.await.unwrap();

    assert_eq!(state.last_error, Some(run_error::MANUAL_ABORT.to_string()));
    assert_eq!(state.last_processed_regions, Some(30));

    let after = load_all(&db).await.unwrap();
    let updated = after.iter().filter(|r| r.last_updated_at != 0).count();
    assert_eq!(updated, 30, "only the two committed batches should carry a fresh timestamp");
}

// --- scenario 4: timeout commits the in-flight batch, skips the rest -------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_4_timeout_commits_the_in_flight_batch_then_stops() {
    let regions: Vec<Region> = (0..80).map(|i| region(&format!("R{i:03}"), "green")).collect();
    let db = seeded_db(&regions).await;

    let counter = Arc::new(AtomicUsize::new(0));
    let sources: Vec<Box<dyn DataSource>> = vec![Box::new(CountingSource { name: "weather_cma", counter: counter.clone(), delay: Duration::from_millis(200) })];
    // collector_max_concurrency=10 -> batch_size = clamp(20, 15, 40) = 20, so
    // each 20-region batch runs in two waves of 10 concurrent fetches: ~0.4s/batch.
    let config = EngineConfig { collector_max_concurrency: 10, workflow_max_runtime_seconds: 1, ..EngineConfig::default() };
    let controller = Arc::new(RunController::with_sources(config, db.clone(), sources, None));

    let state = controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();

    assert!(state.last_error.as_deref().unwrap_or("").starts_with("workflow_partial_timeout_after_1"));
    assert_eq!(state.last_processed_regions, Some(60), "the third (in-flight) batch should still commit before the deadline check skips the fourth");

    let after = load_all(&db).await.unwrap();
    let updated = after.iter().filter(|r| r.last_updated_at != 0).count();
    assert_eq!(updated, 60);
}

// --- scenario 5: url collision isolates only the colliding source ---------

struct CollidingScraper {
    name: &'static str,
    owners: StdMutex<HashMap<String, String>>,
}
#[async_trait]
impl DataSource for CollidingScraper {
    fn name(&self) -> &str {
        self.name
    }
    fn channel(&self) -> Channel {
        Channel::Meteorology
    }
    fn reliability(&self) -> f64 {
        0.45
    }
    fn key_mode(&self) -> KeyMode {
        KeyMode::Simulate
    }
    async fn fetch(&self, region_code: &str, region_name: &str, _cancel: &CancellationToken) -> RawPayload {
        let url = format!("https://weather.example.com/{region_name}");
        let mut owners = self.owners.lock().unwrap();
        match owners.get(&url) {
            Some(owner) if owner != region_code => RawPayload::err(self.name, region_code, SourceError::new(SourceErrorKind::UrlCollision, "already claimed").with_url(url)),
            Some(_) => RawPayload::ok(self.name, region_code, serde_json::json!({})),
            None => {
                owners.insert(url, region_code.to_string());
                RawPayload::ok(self.name, region_code, serde_json::json!({}))
            }
        }
    }
    fn normalize(&self, raw: &RawPayload) -> Option<NormalizedObservation> {
        raw.body.as_ref().map(|_| NormalizedObservation { source: self.name.to_string(), channel: Channel::Meteorology, data: ChannelObservation::Meteorology(MeteorologyObservation { rain_24h: Some(12.0), ..Default::default() }), notes: vec![] })
    }
}

#[tokio::test]
async fn scenario_5_url_collision_does_not_affect_the_other_source_or_region() {
    let mut r2 = region("R002", "green");
    r2.name = "SharedSlug".into();
    let mut r3 = region("R003", "green");
    r3.name = "SharedSlug".into();
    let db = seeded_db(&[r2, r3]).await;

    let sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(CollidingScraper { name: "weather_scraper", owners: StdMutex::new(HashMap::new()) }),
        Box::new(FixedGeology { name: "geology_cgs", slope: Some(10.0), fault_distance: Some(20.0), lithology_risk: Some(0.2) }),
    ];
    let controller = Arc::new(RunController::with_sources(EngineConfig::default(), db.clone(), sources, None));

    controller.trigger_sync("req-1".into(), TriggerOptions::default()).await.unwrap();

    let collections = controller.debug_last_collection().await;
    let last = collections.last().unwrap();
    let by_code: HashMap<&str, _> = last.iter().map(|c| (c.region.region_code.as_str(), c)).collect();

    let collided = by_code.values().filter(|c| c.source_status.errors.contains_key("weather_scraper")).count();
    assert_eq!(collided, 1, "exactly one of the two regions sharing a slug should see the collision");

    for c in by_code.values() {
        assert!(c.source_status.success.get("geology").map(|s| s.contains(&"geology_cgs".to_string())).unwrap_or(false), "the non-colliding source must succeed for every region regardless of the other source's outcome");
    }
}

// --- scenario 6: fast-mode rotation ------------------------------------------

#[tokio::test]
async fn scenario_6_fast_mode_head_is_stable_and_windows_cover_the_tail() {
    let mut regions: Vec<Region> = (0..100).map(|i| region(&format!("R{i:03}"), "green")).collect();
    for i in 0..5 {
        regions[i].risk_level = "red".into();
    }
    let db = seeded_db(&regions).await;

    let sources: Vec<Box<dyn DataSource>> = vec![Box::new(FixedMeteorology { name: "weather_cma", rain_24h: Some(1.0), rain_1h: None, humidity: Some(0.5), soil_moisture: Some(0.3) })];
    let config = EngineConfig { high_risk_head_size: 5, ..EngineConfig::default() };
    let controller = Arc::new(RunController::with_sources(config, db, sources, None));

    let mut head_sets = Vec::new();
    let mut covered: std::collections::HashSet<String> = std::collections::HashSet::new();
    for i in 0..3 {
        let opts = TriggerOptions { mode: RunMode::Fast, region_limit: Some(30), force_llm: false };
        controller.trigger_sync(format!("req-{i}"), opts).await.unwrap();
        let collections = controller.debug_last_collection().await;
        let codes: Vec<String> = collections.last().unwrap().iter().map(|c| c.region.region_code.clone()).collect();
        assert_eq!(codes.len(), 30);
        head_sets.push(codes[..5].to_vec());
        covered.extend(codes);
    }

    assert_eq!(head_sets[0], head_sets[1]);
    assert_eq!(head_sets[1], head_sets[2]);
    assert!(covered.len() > 30, "three distinct request_ids should rotate across more than one window's worth of the tail");
}
