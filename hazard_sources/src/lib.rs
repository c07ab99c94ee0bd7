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
#![allow(unused)]

//! Source Registry & Adapters (spec §4.1, component C1). A `DataSource` is
//! a named, channel-tagged capability that never raises: every failure mode
//! is encoded in `RawPayload.error` rather than propagated as a Rust error,
//! per the teacher's design note to replace exceptions-for-flow-control in
//! adapters with error-in-result.

pub mod errors;
pub mod registry;
pub mod scraper_guard;
pub mod sources;

use async_trait::async_trait;
use hazard_common::datetime::EpochMillis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use errors::{SourceErrorKind, HazardSourceError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Channel {
    Meteorology,
    Geology,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Meteorology => "meteorology",
            Channel::Geology => "geology",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMode {
    Live,
    Simulate,
    Disabled,
}

/// decide key mode the way spec §4.1 describes: absent/placeholder credential
/// disables the source, the sentinel string `"simulate"` fabricates data.
pub fn key_mode_from_credential(credential: Option<&str>) -> KeyMode {
    match credential {
        None => KeyMode::Disabled,
        Some(c) if c.trim().is_empty() => KeyMode::Disabled,
        Some(c) if c.eq_ignore_ascii_case("simulate") => KeyMode::Simulate,
        Some(_) => KeyMode::Live,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
    pub url: Option<String>,
    pub status_code: Option<u16>,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        SourceError {
            kind,
            message: message.into(),
            url: None,
            status_code: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// raw, unparsed result of a single source fetch for a single region.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPayload {
    pub source: String,
    pub region_code: String,
    pub fetched_at: EpochMillis,
    pub success: bool,
    pub body: Option<serde_json::Value>,
    pub error: Option<SourceError>,
    /// true if this payload came out of the cache rather than a fresh request;
    /// the orchestrator sets this, sources never do
    #[serde(default)]
    pub cache_hit: bool,
}

impl RawPayload {
    pub fn ok(source: &str, region_code: &str, body: serde_json::Value) -> Self {
        RawPayload {
            source: source.to_string(),
            region_code: region_code.to_string(),
            fetched_at: EpochMillis::now(),
            success: true,
            body: Some(body),
            error: None,
            cache_hit: false,
        }
    }

    pub fn err(source: &str, region_code: &str, error: SourceError) -> Self {
        RawPayload {
            source: source.to_string(),
            region_code: region_code.to_string(),
            fetched_at: EpochMillis::now(),
            success: false,
            body: None,
            error: Some(error),
            cache_hit: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MeteorologyObservation {
    pub rain_24h: Option<f64>,
    pub rain_1h: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub rain_24h_est: Option<f64>,
    pub rain_1h_est: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GeologyObservation {
    pub slope: Option<f64>,
    pub fault_distance: Option<f64>,
    pub lithology_risk: Option<f64>,
    pub historical_event_count: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ChannelObservation {
    Meteorology(MeteorologyObservation),
    Geology(GeologyObservation),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityNote {
    PrecipitationEstimated,
    Simulated,
}

/// output of `DataSource::normalize` — always channel-typed, never a raw map.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedObservation {
    pub source: String,
    pub channel: Channel,
    pub data: ChannelObservation,
    pub notes: Vec<QualityNote>,
}

impl NormalizedObservation {
    pub fn meteorology(&self) -> Option<&MeteorologyObservation> {
        match &self.data {
            ChannelObservation::Meteorology(m) => Some(m),
            _ => None,
        }
    }

    pub fn geology(&self) -> Option<&GeologyObservation> {
        match &self.data {
            ChannelObservation::Geology(g) => Some(g),
            _ => None,
        }
    }
}

/// credential/key-pool cache abstraction sources depend on, implemented by
/// `hazard_collector`'s two-tier store. This keeps §9's "one-way read" design
/// note: `hazard_sources` never depends on `hazard_collector`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_key_pool(&self, source: &str) -> Vec<String>;
    async fn set_key_pool(&self, source: &str, keys: Vec<String>, ttl: Duration);
    async fn get_active_key(&self, source: &str) -> Option<String>;
    async fn set_active_key(&self, source: &str, key: String, ttl: Duration);
    async fn invalidate_active_key(&self, source: &str);
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;
    fn channel(&self) -> Channel;
    fn reliability(&self) -> f64;
    fn key_mode(&self) -> KeyMode;

    /// perform the fetch; must never panic or propagate an error — all
    /// failures are returned as `RawPayload::err`, and must respect `cancel`.
    async fn fetch(&self, region_code: &str, region_name: &str, cancel: &CancellationToken) -> RawPayload;

    /// pure, idempotent transform from raw bytes/JSON to typed fields.
    /// returns `None` only when `raw.success` is false (nothing to normalize).
    fn normalize(&self, raw: &RawPayload) -> Option<NormalizedObservation>;
}
