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

//! stage 1: outlier flagging and per-region data-quality scoring (spec
//! §4.4.1). Pure; never aborts — a bad reading is corrected or dropped, not
//! raised.

use crate::reliability::reliability_of;
use hazard_collector::CollectionResult;
use hazard_sources::{ChannelObservation, GeologyObservation, MeteorologyObservation, NormalizedObservation};

const METEOROLOGY_ESSENTIAL: usize = 5; // rain_24h, rain_1h, humidity, wind_speed, soil_moisture
const GEOLOGY_ESSENTIAL: usize = 3; // slope, fault_distance, lithology_risk

#[derive(Clone, Debug)]
pub struct ValidatedRegion {
    pub region_code: String,
    pub observations: Vec<NormalizedObservation>,
    pub data_quality_score: f64,
    pub quality_notes: Vec<String>,
}

pub fn validate_batch(batch: &[CollectionResult]) -> Vec<ValidatedRegion> {
    batch.iter().map(validate_region).collect()
}

fn validate_region(collection: &CollectionResult) -> ValidatedRegion {
    let mut quality_notes = Vec::new();
    let mut weighted_coverage_sum = 0.0;
    let mut weight_sum = 0.0;

    let observations: Vec<NormalizedObservation> = collection
        .observations
        .values()
        .map(|obs| {
            let reliability = reliability_of(&obs.source);
            let mut obs = obs.clone();
            let coverage = match &mut obs.data {
                ChannelObservation::Meteorology(m) => {
                    fix_meteorology_outliers(m, &mut quality_notes, &obs.source);
                    meteorology_coverage(m)
                }
                ChannelObservation::Geology(g) => geology_coverage(g),
            };
            weighted_coverage_sum += reliability * coverage;
            weight_sum += reliability;
            obs
        })
        .collect();

    let data_quality_score = if weight_sum > 0.0 { (weighted_coverage_sum / weight_sum).clamp(0.0, 1.0) } else { 0.0 };

    ValidatedRegion { region_code: collection.region.region_code.clone(), observations, data_quality_score, quality_notes }
}

fn fix_meteorology_outliers(m: &mut MeteorologyObservation, notes: &mut Vec<String>, source: &str) {
    if let (Some(h1), Some(h24)) = (m.rain_1h, m.rain_24h) {
        if h1 > h24 {
            m.rain_1h = Some(0.0);
            notes.push(format!("{source}: rain_1h exceeded rain_24h, zeroed"));
        }
    }
    for field in [&mut m.rain_24h, &mut m.rain_1h, &mut m.humidity, &mut m.wind_speed, &mut m.soil_moisture, &mut m.rain_24h_est, &mut m.rain_1h_est] {
        if matches!(field, Some(v) if *v < 0.0) {
            *field = None;
            notes.push(format!("{source}: negative reading discarded"));
        }
    }
}

fn meteorology_coverage(m: &MeteorologyObservation) -> f64 {
    let present = [m.rain_24h.is_some() || m.rain_24h_est.is_some(), m.rain_1h.is_some() || m.rain_1h_est.is_some(), m.humidity.is_some(), m.wind_speed.is_some(), m.soil_moisture.is_some()]
        .iter()
        .filter(|&&b| b)
        .count();
    present as f64 / METEOROLOGY_ESSENTIAL as f64
}

fn geology_coverage(g: &GeologyObservation) -> f64 {
    let present = [g.slope.is_some(), g.fault_distance.is_some(), g.lithology_risk.is_some()].iter().filter(|&&b| b).count();
    present as f64 / GEOLOGY_ESSENTIAL as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_collector::{RegionInput, SourceStatus};
    use hazard_sources::Channel;

    fn collection_with(obs: Vec<NormalizedObservation>) -> CollectionResult {
        CollectionResult {
            region: RegionInput { region_code: "R001".into(), region_name: "Region One".into(), lat: None, lon: None },
            observations: obs.into_iter().map(|o| (o.source.clone(), o)).collect(),
            source_status: SourceStatus::default(),
            historical_event_count: 0,
            previous_warning_snapshot: None,
        }
    }

    #[test]
    fn rain_1h_exceeding_rain_24h_is_zeroed_not_dropped() {
        let obs = NormalizedObservation {
            source: "weather_cma".into(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation { rain_1h: Some(50.0), rain_24h: Some(10.0), ..Default::default() }),
            notes: vec![],
        };
        let validated = validate_region(&collection_with(vec![obs]));
        let m = validated.observations[0].meteorology().unwrap();
        assert_eq!(m.rain_1h, Some(0.0));
    }

    #[test]
    fn negative_reading_becomes_absent_not_zero() {
        let obs = NormalizedObservation {
            source: "weather_cma".into(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation { humidity: Some(-5.0), ..Default::default() }),
            notes: vec![],
        };
        let validated = validate_region(&collection_with(vec![obs]));
        assert!(validated.observations[0].meteorology().unwrap().humidity.is_none());
    }

    #[test]
    fn full_coverage_single_source_yields_score_near_one() {
        let obs = NormalizedObservation {
            source: "weather_cma".into(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation {
                rain_24h: Some(10.0),
                rain_1h: Some(2.0),
                humidity: Some(60.0),
                wind_speed: Some(5.0),
                soil_moisture: Some(0.3),
                ..Default::default()
            }),
            notes: vec![],
        };
        let validated = validate_region(&collection_with(vec![obs]));
        assert!((validated.data_quality_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_observations_yields_zero_score() {
        let validated = validate_region(&collection_with(vec![]));
        assert_eq!(validated.data_quality_score, 0.0);
    }
}
