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

//! Fusion & Scoring Pipeline (spec §4.4, component C4): six ordered, pure
//! stages turning a batch of `CollectionResult` into `Decision` records.
//! Stages never abort the run — failures downgrade to a quality note.

pub mod decision;
pub mod llm;
pub mod merge;
pub mod neighbors;
pub mod reliability;
pub mod scoring;
pub mod validation;

use hazard_collector::CollectionResult;
use hazard_config::EngineConfig;
use hazard_sources::MeteorologyObservation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Green,
    Yellow,
    Orange,
    Red,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Green => "green",
            Level::Yellow => "yellow",
            Level::Orange => "orange",
            Level::Red => "red",
        }
    }

    pub fn from_str(s: &str) -> Option<Level> {
        match s {
            "green" => Some(Level::Green),
            "yellow" => Some(Level::Yellow),
            "orange" => Some(Level::Orange),
            "red" => Some(Level::Red),
            _ => None,
        }
    }

    pub fn step(&self, delta: i32) -> Level {
        let idx = (*self as i32 + delta).clamp(0, 3);
        [Level::Green, Level::Yellow, Level::Orange, Level::Red][idx as usize]
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub formula: String,
    pub final_confidence: f64,
    pub components: HashMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub region_code: String,
    pub region_name: String,
    pub level: Level,
    pub reason: String,
    pub confidence: f64,
    pub merged_observation: MeteorologyObservationPlus,
    pub source_status: hazard_collector::SourceStatus,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub hazard_candidates: Vec<String>,
}

/// meteorology-shaped merge output; geology fields ride alongside since the
/// decision's merged-observation blob covers both channels (spec §6's
/// `merged_observation` contract does not partition by channel).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeteorologyObservationPlus {
    pub meteorology: MeteorologyObservation,
    pub geology: hazard_sources::GeologyObservation,
    pub quality_notes: Vec<String>,
    pub data_quality_score: f64,
}

impl Decision {
    /// assembles the `meteorology` JSON contract from spec §6.
    pub fn to_meteorology_json(&self) -> serde_json::Value {
        serde_json::json!({
            "merged_observation": self.merged_observation,
            "source_status": self.source_status,
            "hazard_candidates": self.hazard_candidates,
            "confidence_breakdown": self.confidence_breakdown,
        })
    }
}

/// entry point: runs all six stages over one batch.
pub async fn run_pipeline(
    batch: &[CollectionResult],
    config: &EngineConfig,
    force_llm: bool,
    llm_client: Option<&dyn llm::LlmClient>,
) -> Vec<Decision> {
    let validated = validation::validate_batch(batch);
    let merged: Vec<_> = validated.iter().map(|v| merge::merge_channels(v)).collect();
    let local: Vec<_> = merged.iter().zip(batch.iter()).map(|(m, c)| scoring::local_risk_score(m, c, config)).collect();

    let adjusted = neighbors::apply_neighbor_influence(batch, &local, config);

    let refined = if config.enable_llm_refinement {
        llm::refine_batch(batch, &merged, &adjusted, config, force_llm, llm_client).await
    } else {
        adjusted.iter().map(|a| llm::RefinementOutcome { adjusted_score: a.adjusted_score, level_override: None, confidence_delta: 0.0, reason_append: None, note: None }).collect()
    };

    batch
        .iter()
        .zip(merged.iter())
        .zip(local.iter())
        .zip(adjusted.iter())
        .zip(refined.iter())
        .map(|((((collection, merge_out), local_out), adj_out), refine_out)| {
            decision::decide(collection, merge_out, local_out, adj_out, refine_out, config)
        })
        .collect()
}
