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

//! stage 2: transparent local risk scoring (spec §4.4.2). Every feature
//! maps through a named piecewise-linear function into `[0, 1]`; the
//! configured weights (`EngineConfig::local_risk_weights`) combine them,
//! renormalized over whichever features are actually present for a region.

use crate::merge::MergeOutput;
use hazard_collector::CollectionResult;
use hazard_config::EngineConfig;

#[derive(Clone, Debug)]
pub struct LocalScoreOutput {
    pub region_code: String,
    pub local_score: f64,
    pub base_confidence: f64,
    pub coverage: f64,
    pub missing_features: Vec<String>,
}

/// clamp `value` into `[0, 1]` over the linear ramp `[low, high]`.
fn ramp(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

fn ramp_inverted(value: f64, low: f64, high: f64) -> f64 {
    1.0 - ramp(value, low, high)
}

/// named feature functions, spec §4.4.2. Ranges are the engine's documented
/// defaults; tune via `local_risk_weights`, not these thresholds, since the
/// weights alone are configuration-exposed.
fn feature_value(name: &str, merged: &MergeOutput, historical_event_count: u32) -> Option<f64> {
    let m = &merged.merged.meteorology;
    let g = &merged.merged.geology;
    match name {
        "rain_24h" => m.rain_24h.or(m.rain_24h_est).map(|v| ramp(v, 0.0, 200.0)),
        "rain_1h" => m.rain_1h.or(m.rain_1h_est).map(|v| ramp(v, 0.0, 50.0)),
        "soil_moisture" => m.soil_moisture.map(|v| ramp(v, 0.1, 0.9)),
        "slope" => g.slope.map(|v| ramp(v, 0.0, 45.0)),
        "fault_distance" => g.fault_distance.map(|v| ramp_inverted(v, 0.0, 50.0)),
        "lithology_risk" => g.lithology_risk.map(|v| v.clamp(0.0, 1.0)),
        "historical_pressure" => Some(ramp(historical_event_count as f64, 0.0, 5.0)),
        "wind_speed" => m.wind_speed.map(|v| ramp(v, 0.0, 30.0)),
        _ => None,
    }
}

pub fn local_risk_score(merged: &MergeOutput, collection: &CollectionResult, config: &EngineConfig) -> LocalScoreOutput {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut missing_features = Vec::new();
    let configured = config.local_risk_weights.len().max(1) as f64;
    let mut present_count = 0.0;

    for (name, weight) in &config.local_risk_weights {
        match feature_value(name, merged, collection.historical_event_count) {
            Some(v) => {
                weighted_sum += weight * v;
                weight_total += weight;
                present_count += 1.0;
            }
            None => missing_features.push(name.clone()),
        }
    }

    let local_score = if weight_total > 0.0 { (weighted_sum / weight_total).clamp(0.0, 1.0) } else { 0.0 };
    let coverage = present_count / configured;
    let base_confidence = (coverage * merged.merged.data_quality_score).clamp(0.0, 1.0);

    LocalScoreOutput { region_code: merged.region_code.clone(), local_score, base_confidence, coverage, missing_features }
}
