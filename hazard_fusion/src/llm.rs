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

//! stage 5: optional, cost-bounded LLM refinement (spec §4.4.5). At most
//! `llm_refine_max_regions` regions are selected per run; a refinement may
//! nudge the level by one step and the confidence by a small clipped delta,
//! never more. A refinement failure degrades to a no-op outcome, never a
//! run failure.

use crate::merge::MergeOutput;
use crate::neighbors::AdjustedOutput;
use crate::Level;
use async_trait::async_trait;
use hazard_collector::CollectionResult;
use hazard_config::EngineConfig;

const CONFIDENCE_DELTA_CLAMP: f64 = 0.2;

#[derive(Clone, Debug, Default)]
pub struct RefinementOutcome {
    pub adjusted_score: f64,
    pub level_override: Option<Level>,
    pub confidence_delta: f64,
    pub reason_append: Option<String>,
    pub note: Option<String>,
}

/// abstraction over the actual model call, so the pipeline never depends on
/// a concrete provider SDK. Implementations are expected to respect the
/// given timeout themselves; this trait carries no cancellation token
/// because a stuck call only drops that one region's refinement.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn refine(&self, region_code: &str, payload: serde_json::Value) -> Result<LlmRefinementResponse, String>;
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct LlmRefinementResponse {
    pub level_override: Option<String>,
    pub reason_append: Option<String>,
    pub confidence_delta: Option<f64>,
}

fn select_candidates(batch: &[CollectionResult], adjusted: &[AdjustedOutput], config: &EngineConfig, force_llm: bool) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..batch.len())
        .filter(|&i| {
            if force_llm {
                return true;
            }
            let previous = batch[i].previous_warning_snapshot.as_ref().and_then(|s| s.adjusted_score);
            let change_exceeded = previous.map(|p| (adjusted[i].adjusted_score - p).abs() >= config.llm_change_threshold).unwrap_or(false);
            let low_confidence = batch[i].previous_warning_snapshot.as_ref().map(|s| s.confidence < config.llm_confidence_threshold).unwrap_or(true);
            change_exceeded || low_confidence
        })
        .collect();

    // highest adjusted score first: when the budget is tight, refine the
    // regions most likely to need a human-legible explanation
    candidates.sort_by(|&a, &b| adjusted[b].adjusted_score.partial_cmp(&adjusted[a].adjusted_score).unwrap());
    candidates.truncate(config.llm_refine_max_regions);
    candidates
}

pub async fn refine_batch(
    batch: &[CollectionResult],
    _merged: &[MergeOutput],
    adjusted: &[AdjustedOutput],
    config: &EngineConfig,
    force_llm: bool,
    llm_client: Option<&dyn LlmClient>,
) -> Vec<RefinementOutcome> {
    let mut outcomes: Vec<RefinementOutcome> = adjusted.iter().map(|a| RefinementOutcome { adjusted_score: a.adjusted_score, ..Default::default() }).collect();

    let Some(client) = llm_client else {
        return outcomes;
    };

    let candidates = select_candidates(batch, adjusted, config, force_llm);

    for idx in candidates {
        let region = &batch[idx];
        let payload = serde_json::json!({
            "region_code": region.region.region_code,
            "adjusted_score": adjusted[idx].adjusted_score,
        });
        match client.refine(&region.region.region_code, payload).await {
            Ok(resp) => {
                let reason_append = resp.reason_append.filter(|s| s.chars().any(is_cjk));
                let confidence_delta = resp.confidence_delta.unwrap_or(0.0).clamp(-CONFIDENCE_DELTA_CLAMP, CONFIDENCE_DELTA_CLAMP);
                let level_override = resp.level_override.as_deref().and_then(Level::from_str);
                outcomes[idx] = RefinementOutcome { adjusted_score: adjusted[idx].adjusted_score, level_override, confidence_delta, reason_append, note: None };
            }
            Err(e) => {
                outcomes[idx].note = Some(format!("llm refinement failed: {e}"));
            }
        }
    }

    outcomes
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF)
}
