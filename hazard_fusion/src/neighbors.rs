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

//! stage 4: geographic neighbor influence (spec §4.4.4). Blends each
//! region's local score with the mean of its `k` nearest neighbors within
//! the same batch; regions with fewer than two resolvable neighbors are
//! left unadjusted.

use crate::scoring::LocalScoreOutput;
use hazard_collector::CollectionResult;
use hazard_common::geo::{k_nearest, GeoPoint};
use hazard_config::EngineConfig;

#[derive(Clone, Debug)]
pub struct AdjustedOutput {
    pub region_code: String,
    pub adjusted_score: f64,
    pub neighbor_influence: Option<f64>,
    pub neighbor_count: usize,
}

pub fn apply_neighbor_influence(batch: &[CollectionResult], local: &[LocalScoreOutput], config: &EngineConfig) -> Vec<AdjustedOutput> {
    let points: Vec<Option<GeoPoint>> = batch.iter().map(|c| match (c.region.lat, c.region.lon) { (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)), _ => None }).collect();

    local
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let neighbors = k_nearest(&points, i, config.neighbor_k);
            if neighbors.len() < 2 {
                return AdjustedOutput { region_code: l.region_code.clone(), adjusted_score: l.local_score, neighbor_influence: None, neighbor_count: neighbors.len() };
            }
            let neighbor_mean = neighbors.iter().map(|&j| local[j].local_score).sum::<f64>() / neighbors.len() as f64;
            let w = config.neighbor_influence_weight.clamp(0.0, 1.0);
            let adjusted_score = ((1.0 - w) * l.local_score + w * neighbor_mean).clamp(0.0, 1.0);
            AdjustedOutput { region_code: l.region_code.clone(), adjusted_score, neighbor_influence: Some(neighbor_mean), neighbor_count: neighbors.len() }
        })
        .collect()
}
