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

//! stage 3: reliability-weighted channel merge (spec §4.4.3). Numeric
//! fields average across reporting sources, weighted by reliability;
//! estimated (`_est`) fields are only consulted when every source is
//! silent on the non-estimated counterpart.

use crate::reliability::reliability_of;
use crate::MeteorologyObservationPlus;
use crate::validation::ValidatedRegion;
use hazard_sources::GeologyObservation;

#[derive(Clone, Debug)]
pub struct MergeOutput {
    pub region_code: String,
    pub merged: MeteorologyObservationPlus,
}

pub fn merge_channels(v: &ValidatedRegion) -> MergeOutput {
    let mut rain_24h = WeightedMean::default();
    let mut rain_1h = WeightedMean::default();
    let mut humidity = WeightedMean::default();
    let mut wind_speed = WeightedMean::default();
    let mut soil_moisture = WeightedMean::default();
    let mut rain_24h_est = WeightedMean::default();
    let mut rain_1h_est = WeightedMean::default();

    let mut slope = WeightedMean::default();
    let mut fault_distance = WeightedMean::default();
    let mut lithology_risk = WeightedMean::default();
    let mut historical_event_count: Option<u32> = None;
    let mut historical_event_count_weight = 0.0;

    for obs in &v.observations {
        let weight = reliability_of(&obs.source);
        if let Some(m) = obs.meteorology() {
            rain_24h.push(m.rain_24h, weight);
            rain_1h.push(m.rain_1h, weight);
            humidity.push(m.humidity, weight);
            wind_speed.push(m.wind_speed, weight);
            soil_moisture.push(m.soil_moisture, weight);
            rain_24h_est.push(m.rain_24h_est, weight);
            rain_1h_est.push(m.rain_1h_est, weight);
        }
        if let Some(g) = obs.geology() {
            slope.push(g.slope, weight);
            fault_distance.push(g.fault_distance, weight);
            lithology_risk.push(g.lithology_risk, weight);
            if let Some(n) = g.historical_event_count {
                if weight > historical_event_count_weight {
                    historical_event_count = Some(n);
                    historical_event_count_weight = weight;
                }
            }
        }
    }

    let meteorology = hazard_sources::MeteorologyObservation {
        rain_24h: rain_24h.resolve(),
        rain_1h: rain_1h.resolve(),
        humidity: humidity.resolve(),
        wind_speed: wind_speed.resolve(),
        soil_moisture: soil_moisture.resolve(),
        // estimated fields only fill in when the real field never reported
        rain_24h_est: if rain_24h.reported { None } else { rain_24h_est.resolve() },
        rain_1h_est: if rain_1h.reported { None } else { rain_1h_est.resolve() },
    };

    let geology = GeologyObservation {
        slope: slope.resolve(),
        fault_distance: fault_distance.resolve(),
        lithology_risk: lithology_risk.resolve(),
        historical_event_count,
    };

    MergeOutput {
        region_code: v.region_code.clone(),
        merged: MeteorologyObservationPlus {
            meteorology,
            geology,
            quality_notes: v.quality_notes.clone(),
            data_quality_score: v.data_quality_score,
        },
    }
}

#[derive(Default)]
struct WeightedMean {
    weighted_sum: f64,
    weight_total: f64,
    reported: bool,
}

impl WeightedMean {
    fn push(&mut self, value: Option<f64>, weight: f64) {
        if let Some(v) = value {
            self.weighted_sum += v * weight;
            self.weight_total += weight;
            self.reported = true;
        }
    }

    fn resolve(&self) -> Option<f64> {
        if self.weight_total > 0.0 {
            Some(self.weighted_sum / self.weight_total)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_sources::{Channel, ChannelObservation, MeteorologyObservation, NormalizedObservation, QualityNote};

    fn obs(source: &str, rain_24h: Option<f64>) -> NormalizedObservation {
        NormalizedObservation {
            source: source.to_string(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation { rain_24h, ..Default::default() }),
            notes: vec![],
        }
    }

    #[test]
    fn merged_rain_lies_between_source_extremes() {
        let v = ValidatedRegion {
            region_code: "R001".into(),
            observations: vec![obs("weather_cma", Some(10.0)), obs("weather_scraper", Some(40.0))],
            data_quality_score: 1.0,
            quality_notes: vec![],
        };
        let merged = merge_channels(&v).merged.meteorology.rain_24h.unwrap();
        assert!(merged >= 10.0 && merged <= 40.0);
        // weather_cma (0.92) outweighs weather_scraper (0.45), so the merge
        // should land closer to the more reliable source
        assert!(merged < 25.0);
    }

    #[test]
    fn estimated_field_ignored_when_real_field_present() {
        let mut real = obs("weather_cma", Some(10.0));
        let mut estimated = NormalizedObservation {
            source: "weather_amap".to_string(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation { rain_24h_est: Some(99.0), ..Default::default() }),
            notes: vec![QualityNote::PrecipitationEstimated],
        };
        let v = ValidatedRegion {
            region_code: "R001".into(),
            observations: vec![real.clone(), estimated.clone()],
            data_quality_score: 1.0,
            quality_notes: vec![],
        };
        let merged = merge_channels(&v).merged.meteorology;
        assert_eq!(merged.rain_24h, Some(10.0));
        assert_eq!(merged.rain_24h_est, None);
    }

    #[test]
    fn estimated_field_used_when_no_source_reports_real_field() {
        let estimated = NormalizedObservation {
            source: "weather_amap".to_string(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation { rain_24h_est: Some(12.0), ..Default::default() }),
            notes: vec![QualityNote::PrecipitationEstimated],
        };
        let v = ValidatedRegion { region_code: "R001".into(), observations: vec![estimated], data_quality_score: 1.0, quality_notes: vec![] };
        let merged = merge_channels(&v).merged.meteorology;
        assert_eq!(merged.rain_24h, None);
        assert_eq!(merged.rain_24h_est, Some(12.0));
    }

    #[test]
    fn absent_field_across_all_sources_stays_absent() {
        let v = ValidatedRegion { region_code: "R001".into(), observations: vec![obs("weather_cma", None)], data_quality_score: 0.0, quality_notes: vec![] };
        let merged = merge_channels(&v).merged.meteorology;
        assert_eq!(merged.rain_24h, None);
    }
}
