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

//! Region Selector (spec §4.7, component C7): a pure function from the full
//! region list plus run options to a deterministic subset. `manual` and
//! `scheduled` are additive modes not named in spec.md's selector section;
//! both are treated as `full` runs capped by `workflow_manual_region_limit`
//! when no explicit `region_limit` is given, since the spec only describes
//! selection behavior for `full` and `fast`.

use crate::region::Region;
use crate::run_state::RunMode;
use hazard_common::ids::stable_hash;
use hazard_config::EngineConfig;

pub fn select_regions(all_regions: &[Region], mode: RunMode, request_id: &str, region_limit: Option<usize>, config: &EngineConfig) -> Vec<Region> {
    match mode {
        RunMode::Full | RunMode::Scheduled => all_regions.to_vec(),
        RunMode::Manual => {
            let limit = region_limit.unwrap_or(config.workflow_manual_region_limit);
            all_regions.iter().take(limit).cloned().collect()
        }
        RunMode::Fast => fast_mode_select(all_regions, request_id, region_limit.unwrap_or(config.workflow_manual_region_limit), config.high_risk_head_size),
    }
}

fn fast_mode_select(all_regions: &[Region], request_id: &str, region_limit: usize, high_risk_head_size: usize) -> Vec<Region> {
    let mut head: Vec<&Region> = all_regions.iter().filter(|r| r.risk_level == "orange" || r.risk_level == "red").collect();
    head.sort_by(|a, b| level_rank(&b.risk_level).cmp(&level_rank(&a.risk_level)).then(a.code.cmp(&b.code)));
    head.truncate(high_risk_head_size);

    let head_codes: std::collections::HashSet<&str> = head.iter().map(|r| r.code.as_str()).collect();
    let mut rest: Vec<&Region> = all_regions.iter().filter(|r| !head_codes.contains(r.code.as_str())).collect();
    rest.sort_by(|a, b| a.code.cmp(&b.code));

    let window_size = region_limit.saturating_sub(head.len()).min(rest.len());
    let mut window = Vec::with_capacity(window_size);
    if !rest.is_empty() && window_size > 0 {
        let offset = (stable_hash(request_id) % rest.len() as u64) as usize;
        for i in 0..window_size {
            window.push(rest[(offset + i) % rest.len()]);
        }
    }

    head.into_iter().chain(window).cloned().collect()
}

fn level_rank(level: &str) -> u8 {
    match level {
        "red" => 3,
        "orange" => 2,
        "yellow" => 1,
        _ => 0,
    }
}
