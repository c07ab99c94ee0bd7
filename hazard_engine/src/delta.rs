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

//! Delta Publisher (spec §4.6, component C6). Best-effort broadcast: a
//! subscriber that falls behind misses messages rather than slowing down
//! the run, since the database remains the authoritative state.

use hazard_fusion::{Decision, Level};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeltaResult {
    pub region_code: String,
    pub region_name: String,
    pub level: Level,
    pub reason: String,
    pub confidence: f64,
    pub meteorology: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Delta {
    pub timestamp: i64,
    pub results: Vec<DeltaResult>,
}

pub struct DeltaPublisher {
    sender: broadcast::Sender<Delta>,
}

impl DeltaPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        DeltaPublisher { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delta> {
        self.sender.subscribe()
    }

    /// never blocks: `send` on a broadcast channel only fails when there are
    /// no subscribers, which is a normal idle state, not an error to report.
    pub fn publish(&self, timestamp: i64, decisions: &[Decision]) {
        let results = decisions
            .iter()
            .map(|d| DeltaResult {
                region_code: d.region_code.clone(),
                region_name: d.region_name.clone(),
                level: d.level,
                reason: d.reason.clone(),
                confidence: d.confidence,
                meteorology: d.to_meteorology_json(),
            })
            .collect();
        let _ = self.sender.send(Delta { timestamp, results });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_collector::SourceStatus;
    use hazard_fusion::{ConfidenceBreakdown, MeteorologyObservationPlus};

    fn decision(code: &str) -> Decision {
        Decision {
            region_code: code.into(),
            region_name: code.into(),
            level: Level::Yellow,
            reason: "test".into(),
            confidence: 0.5,
            merged_observation: MeteorologyObservationPlus::default(),
            source_status: SourceStatus::default(),
            confidence_breakdown: ConfidenceBreakdown::default(),
            hazard_candidates: vec![],
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_batches() {
        let publisher = DeltaPublisher::new(16);
        let mut rx = publisher.subscribe();
        publisher.publish(1000, &[decision("R001")]);
        let delta = rx.recv().await.unwrap();
        assert_eq!(delta.results.len(), 1);
        assert_eq!(delta.results[0].region_code, "R001");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let publisher = DeltaPublisher::new(16);
        publisher.publish(1000, &[decision("R001")]);
    }
}
