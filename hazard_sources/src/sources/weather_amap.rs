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
//! AMap realtime weather endpoint. Provides no millimetric precipitation, so
//! `normalize` only ever writes the `_est` variants, tagged `precipitation_estimated`
//! (spec §4.1). Estimated fields only enter scoring once no non-estimated
//! source reported anything — that gating lives in the fusion pipeline's
//! channel-merge stage, not here.

use crate::{
    sources::simulated_f64, Channel, ChannelObservation, DataSource, KeyMode, MeteorologyObservation,
    NormalizedObservation, QualityNote, RawPayload, SourceError, SourceErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const NAME: &str = "weather_amap";
const RELIABILITY: f64 = 0.70;

pub struct WeatherAmap {
    client: Client,
    key_mode: KeyMode,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherAmap {
    pub fn new(client: Client, key_mode: KeyMode, base_url: String, api_key: Option<String>) -> Self {
        WeatherAmap { client, key_mode, base_url, api_key }
    }
}

#[async_trait]
impl DataSource for WeatherAmap {
    fn name(&self) -> &str {
        NAME
    }
    fn channel(&self) -> Channel {
        Channel::Meteorology
    }
    fn reliability(&self) -> f64 {
        RELIABILITY
    }
    fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    async fn fetch(&self, region_code: &str, region_name: &str, cancel: &CancellationToken) -> RawPayload {
        if self.key_mode == KeyMode::Disabled {
            return RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Disabled, "no AMap key configured"));
        }

        if self.key_mode == KeyMode::Simulate {
            let body = json!({
                "humidity": simulated_f64(region_code, 1, 20.0, 95.0),
                "wind_speed": simulated_f64(region_code, 2, 0.0, 15.0),
                "rain_intensity_hint": simulated_f64(region_code, 3, 0.0, 10.0),
                "simulated": true,
            });
            return RawPayload::ok(NAME, region_code, body);
        }

        let key = self.api_key.clone().unwrap_or_default();
        let url = format!("{}/weather/now?city={}&key={}", self.base_url, region_code, key);
        tokio::select! {
            _ = cancel.cancelled() => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Cancelled, "cancelled").with_url(&url)),
            resp = self.client.get(&url).send() => {
                match resp {
                    Ok(r) if r.status().is_success() => match r.json::<serde_json::Value>().await {
                        Ok(body) => RawPayload::ok(NAME, region_code, body),
                        Err(e) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HtmlParseNoMetrics, e.to_string()).with_url(&url)),
                    },
                    Ok(r) if r.status().as_u16() == 401 || r.status().as_u16() == 403 => {
                        RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::AuthFailed, "invalid AMap key").with_url(&url).with_status(r.status().as_u16()))
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
        let hint = body.get("rain_intensity_hint").and_then(|v| v.as_f64());

        let mut notes = vec![QualityNote::PrecipitationEstimated];
        if body.get("simulated").and_then(|v| v.as_bool()).unwrap_or(false) {
            notes.push(QualityNote::Simulated);
        }

        Some(NormalizedObservation {
            source: NAME.to_string(),
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation {
                rain_24h: None,
                rain_1h: None,
                humidity: body.get("humidity").and_then(|v| v.as_f64()),
                wind_speed: body.get("wind_speed").and_then(|v| v.as_f64()),
                soil_moisture: None,
                rain_24h_est: hint.map(|h| h * 8.0),
                rain_1h_est: hint,
            }),
            notes,
        })
    }
}
