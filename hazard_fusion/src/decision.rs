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

//! stage 6: level decision with hysteresis, hazard-candidate tagging, and
//! confidence-breakdown assembly (spec §4.4.6 / §6). The final
//! `confidence_breakdown.components` map always carries an `adjusted_score`
//! entry — `orchestrator::load_previous_snapshot` reads it back out of the
//! persisted `meteorology` JSON blob on the next run to seed hysteresis and
//! the LLM change-threshold check.

use crate::llm::RefinementOutcome;
use crate::merge::MergeOutput;
use crate::neighbors::AdjustedOutput;
use crate::scoring::LocalScoreOutput;
use crate::{ConfidenceBreakdown, Decision, Level};
use hazard_collector::CollectionResult;
use hazard_config::EngineConfig;
use std::collections::HashMap;

fn threshold_for(level: Level) -> f64 {
    match level {
        Level::Green => 0.0,
        Level::Yellow => 0.3,
        Level::Orange => 0.55,
        Level::Red => 0.8,
    }
}

fn level_from_score(score: f64) -> Level {
    if score < 0.3 {
        Level::Green
    } else if score < 0.55 {
        Level::Yellow
    } else if score < 0.8 {
        Level::Orange
    } else {
        Level::Red
    }
}

/// spec §4.4.6's hysteresis: a rise must clear its entry threshold by at
/// least 0.02; a fall must clear its previous threshold by at least 0.04,
/// and only ever steps down one level per run.
fn apply_hysteresis(score: f64, previous: Option<Level>) -> Level {
    let base = level_from_score(score);
    let Some(prev) = previous else {
        return base;
    };

    if base > prev {
        if score >= threshold_for(base) + 0.02 {
            base
        } else {
            prev
        }
    } else if base < prev {
        let one_step_down = prev.step(-1);
        if score <= threshold_for(prev) - 0.04 {
            one_step_down
        } else {
            prev
        }
    } else {
        prev
    }
}

struct HazardCandidate {
    name: &'static str,
    phrase: &'static str,
    strength: f64,
}

fn hazard_candidates(merged: &MergeOutput) -> Vec<HazardCandidate> {
    let m = &merged.merged.meteorology;
    let g = &merged.merged.geology;
    let mut out = Vec::new();

    let rain_24h = m.rain_24h.or(m.rain_24h_est).unwrap_or(0.0);
    let rain_1h = m.rain_1h.or(m.rain_1h_est).unwrap_or(0.0);
    let slope = g.slope.unwrap_or(0.0);
    let fault_distance = g.fault_distance.unwrap_or(f64::MAX);
    let lithology_risk = g.lithology_risk.unwrap_or(0.0);
    let wind_speed = m.wind_speed.unwrap_or(0.0);

    if rain_24h >= 150.0 && slope >= 30.0 {
        out.push(HazardCandidate { name: "landslide", phrase: "heavy 24h rainfall over steep terrain", strength: (rain_24h / 200.0 + slope / 45.0) / 2.0 });
    }
    if rain_1h >= 25.0 && fault_distance <= 5.0 && lithology_risk >= 0.5 {
        out.push(HazardCandidate { name: "debris_flow", phrase: "intense short-duration rain near an active fault with loose lithology", strength: (rain_1h / 50.0 + lithology_risk) / 2.0 });
    }
    if rain_24h >= 80.0 && slope < 15.0 {
        out.push(HazardCandidate { name: "flood", phrase: "sustained rainfall over low-gradient terrain", strength: rain_24h / 200.0 });
    }
    if lithology_risk >= 0.7 && slope >= 20.0 {
        out.push(HazardCandidate { name: "rockfall", phrase: "unstable lithology on a moderate-to-steep slope", strength: lithology_risk });
    }
    if wind_speed >= 20.0 {
        out.push(HazardCandidate { name: "wind_damage", phrase: "sustained high wind speed", strength: wind_speed / 30.0 });
    }

    out.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    out
}

fn compose_reason(candidates: &[HazardCandidate], level: Level) -> String {
    if candidates.is_empty() {
        return format!("local risk assessment at {} level", level.as_str());
    }
    let phrases: Vec<&str> = candidates.iter().map(|c| c.phrase).collect();
    format!("{} risk ({})", level.as_str(), phrases.join("; "))
}

pub fn decide(
    collection: &CollectionResult,
    merge_out: &MergeOutput,
    local_out: &LocalScoreOutput,
    adj_out: &AdjustedOutput,
    refine_out: &RefinementOutcome,
    config: &EngineConfig,
) -> Decision {
    let previous_level = collection.previous_warning_snapshot.as_ref().and_then(|s| Level::from_str(&s.level));

    let mut level = apply_hysteresis(adj_out.adjusted_score, previous_level);
    if let Some(override_level) = refine_out.level_override {
        // an LLM override may only nudge one step off the hysteresis result
        level = if override_level > level {
            level.step(1)
        } else if override_level < level {
            level.step(-1)
        } else {
            level
        };
    }

    let confidence = (local_out.base_confidence + refine_out.confidence_delta).clamp(0.0, 1.0);

    let candidates = hazard_candidates(merge_out);
    let mut reason = compose_reason(&candidates, level);
    if let Some(extra) = &refine_out.reason_append {
        reason.push_str(" — ");
        reason.push_str(extra);
    }

    let previous_adjusted_score = collection.previous_warning_snapshot.as_ref().and_then(|s| s.adjusted_score);
    let volatility = previous_adjusted_score.map(|prev| (adj_out.adjusted_score - prev).abs()).unwrap_or(0.0);

    let mut components = HashMap::new();
    components.insert("adjusted_score".to_string(), adj_out.adjusted_score);
    components.insert("coverage".to_string(), local_out.coverage);
    components.insert("volatility".to_string(), volatility);
    components.insert("neighbor_influence".to_string(), adj_out.neighbor_influence.unwrap_or(local_out.local_score));
    components.insert("llm_delta".to_string(), refine_out.confidence_delta);
    components.insert("threshold_margin".to_string(), adj_out.adjusted_score - threshold_for(level));
    components.insert("data_quality".to_string(), merge_out.merged.data_quality_score);
    let _ = config;

    Decision {
        region_code: collection.region.region_code.clone(),
        region_name: collection.region.region_name.clone(),
        level,
        reason,
        confidence,
        merged_observation: merge_out.merged.clone(),
        source_status: collection.source_status.clone(),
        confidence_breakdown: ConfidenceBreakdown { formula: "base_confidence + llm_delta, clamped [0,1]".to_string(), final_confidence: confidence, components },
        hazard_candidates: candidates.into_iter().map(|c| c.name.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeteorologyObservationPlus;
    use hazard_collector::{RegionInput, SourceStatus, WarningSnapshot};
    use hazard_sources::{GeologyObservation, MeteorologyObservation};

    fn collection(previous: Option<WarningSnapshot>) -> CollectionResult {
        CollectionResult {
            region: RegionInput { region_code: "R001".into(), region_name: "Region One".into(), lat: None, lon: None },
            observations: Default::default(),
            source_status: SourceStatus::default(),
            historical_event_count: 0,
            previous_warning_snapshot: previous,
        }
    }

    fn merge_out() -> MergeOutput {
        MergeOutput {
            region_code: "R001".into(),
            merged: MeteorologyObservationPlus { meteorology: MeteorologyObservation::default(), geology: GeologyObservation::default(), quality_notes: vec![], data_quality_score: 1.0 },
        }
    }

    fn local_out() -> LocalScoreOutput {
        LocalScoreOutput { region_code: "R001".into(), local_score: 0.5, base_confidence: 0.8, coverage: 1.0, missing_features: vec![] }
    }

    fn adj_out(score: f64) -> AdjustedOutput {
        AdjustedOutput { region_code: "R001".into(), adjusted_score: score, neighbor_influence: Some(score), neighbor_count: 3 }
    }

    fn no_refine(score: f64) -> RefinementOutcome {
        RefinementOutcome { adjusted_score: score, ..Default::default() }
    }

    #[test]
    fn first_run_has_no_hysteresis_and_uses_raw_threshold() {
        let d = decide(&collection(None), &merge_out(), &local_out(), &adj_out(0.6), &no_refine(0.6), &EngineConfig::default());
        assert_eq!(d.level, Level::Orange);
    }

    #[test]
    fn marginal_rise_is_suppressed_by_hysteresis() {
        let previous = Some(WarningSnapshot { level: "yellow".into(), confidence: 0.8, adjusted_score: Some(0.4), created_at: 0 });
        // 0.305 barely crosses into yellow's territory already, so bump to orange's boundary without clearing the +0.02 margin
        let d = decide(&collection(previous), &merge_out(), &local_out(), &adj_out(0.551), &no_refine(0.551), &EngineConfig::default());
        assert_eq!(d.level, Level::Yellow);
    }

    #[test]
    fn fall_only_steps_down_one_level_at_a_time() {
        let previous = Some(WarningSnapshot { level: "red".into(), confidence: 0.9, adjusted_score: Some(0.85), created_at: 0 });
        let d = decide(&collection(previous), &merge_out(), &local_out(), &adj_out(0.1), &no_refine(0.1), &EngineConfig::default());
        assert_eq!(d.level, Level::Orange);
    }

    #[test]
    fn confidence_breakdown_always_carries_adjusted_score() {
        let d = decide(&collection(None), &merge_out(), &local_out(), &adj_out(0.4), &no_refine(0.4), &EngineConfig::default());
        assert_eq!(d.confidence_breakdown.components.get("adjusted_score"), Some(&0.4));
    }

    #[test]
    fn volatility_is_zero_on_a_first_run_and_the_absolute_delta_thereafter() {
        let first = decide(&collection(None), &merge_out(), &local_out(), &adj_out(0.4), &no_refine(0.4), &EngineConfig::default());
        assert_eq!(first.confidence_breakdown.components.get("volatility"), Some(&0.0));

        let previous = Some(WarningSnapshot { level: "yellow".into(), confidence: 0.6, adjusted_score: Some(0.4), created_at: 0 });
        let later = decide(&collection(previous), &merge_out(), &local_out(), &adj_out(0.7), &no_refine(0.7), &EngineConfig::default());
        let volatility = *later.confidence_breakdown.components.get("volatility").unwrap();
        assert!((volatility - 0.3).abs() < 1e-9, "got {volatility}");
    }

    #[test]
    fn heavy_rain_and_steep_slope_surfaces_landslide_candidate() {
        let merged = MergeOutput {
            region_code: "R001".into(),
            merged: MeteorologyObservationPlus {
                meteorology: MeteorologyObservation { rain_24h: Some(180.0), ..Default::default() },
                geology: GeologyObservation { slope: Some(35.0), ..Default::default() },
                quality_notes: vec![],
                data_quality_score: 1.0,
            },
        };
        let d = decide(&collection(None), &merged, &local_out(), &adj_out(0.9), &no_refine(0.9), &EngineConfig::default());
        assert!(d.hazard_candidates.contains(&"landslide".to_string()));
    }
}
