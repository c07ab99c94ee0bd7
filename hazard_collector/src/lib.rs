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

//! Collection Orchestrator & Cache/Credential Store (spec §4.2/§4.3,
//! components C2/C3): bounded-concurrency fan-out of the source registry
//! over a batch of regions, with cache short-circuiting and historical
//! context loaded for the fusion pipeline.

pub mod cache;
pub mod db;
pub mod orchestrator;

use hazard_sources::{Channel, NormalizedObservation, SourceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionInput {
    pub region_code: String,
    pub region_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceStatus {
    /// channel -> names of sources that succeeded for this region
    pub success: HashMap<String, Vec<String>>,
    /// source name -> error detail
    pub errors: HashMap<String, SourceError>,
}

/// minimal projection of a region's most recent WarningRecord, loaded before
/// fusion runs so its change-detection and hysteresis stages have something
/// to compare against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarningSnapshot {
    pub level: String,
    pub confidence: f64,
    pub adjusted_score: Option<f64>,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionResult {
    pub region: RegionInput,
    pub observations: HashMap<String, NormalizedObservation>,
    pub source_status: SourceStatus,
    pub historical_event_count: u32,
    pub previous_warning_snapshot: Option<WarningSnapshot>,
}

impl CollectionResult {
    pub fn channel_observations(&self, channel: Channel) -> Vec<&NormalizedObservation> {
        self.observations.values().filter(|o| o.channel == channel).collect()
    }
}
