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
//! China Geological Survey hazard-susceptibility endpoint. Geology is
//! slow-changing, so this source is the highest-reliability geology input
//! and is polled far less often than the weather sources upstream.

use crate::{
    sources::simulated_f64, Channel, ChannelObservation, DataSource, GeologyObservation, KeyMode,
    NormalizedObservation, QualityNote, RawPayload, SourceError, SourceErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const NAME: &str = "geology_cgs";
const RELIABILITY: f64 = 0.88;

pub struct GeologyCgs {
    client: Client,
    key_mode: KeyMode,
    base_url: String,
    api_key: Option<String>,
}

impl GeologyCgs {
    pub fn new(client: Client, key_mode: KeyMode, base_url: String, api_key: Option<String>) -> Self {
        GeologyCgs { client, key_mode, base_url, api_key }
    }
}

#[async_trait]
impl DataSource for GeologyCgs {
    fn name(&self) -> &str {
        NAME
    }
    fn channel(&self) -> Channel {
        Channel::Geology
    }
    fn reliability(&self) -> f64 {
        RELIABILITY
    }
    fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    async fn fetch(&self, region_code: &str, region_name: &str, cancel: &CancellationToken) -> RawPayload {
        if self.key_mode == KeyMode::Disabled {
            return RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Disabled, "no CGS key configured"));
        }

        if self.key_mode == KeyMode::Simulate {
            let body = json!({
                "slope": simulated_f64(region_code, 20, 0.0, 45.0),
                "fault_distance": simulated_f64(region_code, 21, 0.1, 80.0),
                "lithology_risk": simulated_f64(region_code, 22, 0.0, 1.0),
                "historical_event_count": (simulated_f64(region_code, 23, 0.0, 6.0)) as u64,
                "simulated": true,
            });
            return RawPayload::ok(NAME, region_code, body);
        }

        let key = self.api_key.clone().unwrap_or_default();
        let url = format!("{}/susceptibility?region={}&key={}", self.base_url, region_code, key);
        tokio::select! {
            _ = cancel.cancelled() => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Cancelled, "cancelled").with_url(&url)),
            resp = self.client.get(&url).send() => {
                match resp {
                    Ok(r) if r.status().is_success() => match r.json::<serde_json::Value>().await {
                        Ok(body) => RawPayload::ok(NAME, region_code, body),
                        Err(e) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HtmlParseNoMetrics, e.to_string()).with_url(&url)),
                    },
                    Ok(r) if r.status().as_u16() == 401 || r.status().as_u16() == 403 => {
                        RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::AuthFailed, "invalid CGS key").with_url(&url).with_status(r.status().as_u16()))
                    }
                    Ok(r) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HttpStatus(r.status().as_u16()), "non-success status").with_url(&url).with_status(r.status().as_u16())),
                    Err(e) if e.is_timeout() => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Timeout, e.to_string()).with_url(&url)),
                    Err(e) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::ConnectError, e.to_string()).with_url(&url)),
                }
            }
        }
    }

    fn normalize(&self, raw: &RawPayload) -> Option<NormalizedObservation> {
        if !raw.success {
            return None;
        }
        let body = raw.body.as_ref()?;
        let mut notes = Vec::new();
        if body.get("simulated").and_then(|v| v.as_bool()).unwrap_or(false) {
            notes.push(QualityNote::Simulated);
        }

        Some(NormalizedObservation {
            source: NAME.to_string(),
            channel: Channel::Geology,
            data: ChannelObservation::Geology(GeologyObservation {
                slope: body.get("slope").and_then(|v| v.as_f64()),
                fault_distance: body.get("fault_distance").and_then(|v| v.as_f64()),
                lithology_risk: body.get("lithology_risk").and_then(|v| v.as_f64()),
                historical_event_count: body.get("historical_event_count").and_then(|v| v.as_u64()).map(|n| n as u32),
            }),
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulate_mode_populates_all_geology_fields() {
        let s = GeologyCgs::new(Client::new(), KeyMode::Simulate, "https://cgs.example.com".into(), None);
        let cancel = CancellationToken::new();
        let raw = s.fetch("R001", "Region One", &cancel).await;
        let obs = s.normalize(&raw).unwrap();
        let geo = obs.geology().unwrap();
        assert!(geo.slope.is_some());
        assert!(geo.fault_distance.is_some());
        assert!(geo.lithology_risk.is_some());
        assert!(geo.historical_event_count.is_some());
    }

    #[tokio::test]
    async fn disabled_short_circuits_without_network_call() {
        let s = GeologyCgs::new(Client::new(), KeyMode::Disabled, "https://cgs.example.com".into(), None);
        let cancel = CancellationToken::new();
        let raw = s.fetch("R001", "Region One", &cancel).await;
        assert_eq!(raw.error.unwrap().kind, SourceErrorKind::Disabled);
    }
}
