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
use crate::{
    sources::simulated_f64, Channel, ChannelObservation, DataSource, KeyMode, MeteorologyObservation,
    NormalizedObservation, QualityNote, RawPayload, SourceError, SourceErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const NAME: &str = "weather_openweather";
const RELIABILITY: f64 = 0.65;

pub struct WeatherOpenWeather {
    client: Client,
    key_mode: KeyMode,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherOpenWeather {
    pub fn new(client: Client, key_mode: KeyMode, base_url: String, api_key: Option<String>) -> Self {
        WeatherOpenWeather { client, key_mode, base_url, api_key }
    }
}

#[async_trait]
impl DataSource for WeatherOpenWeather {
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
            return RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Disabled, "no OpenWeather key configured"));
        }

        if self.key_mode == KeyMode::Simulate {
            let body = json!({
                "rain_1h": simulated_f64(region_code, 8, 0.0, 6.0),
                "rain_24h": simulated_f64(region_code, 9, 0.0, 60.0),
                "humidity": simulated_f64(region_code, 10, 20.0, 100.0),
                "wind_speed": simulated_f64(region_code, 11, 0.0, 20.0),
                "simulated": true,
            });
            return RawPayload::ok(NAME, region_code, body);
        }

        let key = self.api_key.clone().unwrap_or_default();
        let url = format!("{}/data/2.5/weather?q={}&appid={}", self.base_url, region_code, key);
        tokio::select! {
            _ = cancel.cancelled() => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Cancelled, "cancelled").with_url(&url)),
            resp = self.client.get(&url).send() => {
                match resp {
                    Ok(r) if r.status().is_success() => match r.json::<serde_json::Value>().await {
                        Ok(body) => RawPayload::ok(NAME, region_code, body),
                        Err(e) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HtmlParseNoMetrics, e.to_string()).with_url(&url)),
                    },
                    Ok(r) if r.status().as_u16() == 401 => {
                        RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::AuthFailed, "invalid OpenWeather key").with_url(&url).with_status(401))
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
            channel: Channel::Meteorology,
            data: ChannelObservation::Meteorology(MeteorologyObservation {
                rain_24h: body.get("rain_24h").and_then(|v| v.as_f64()),
                rain_1h: body.get("rain_1h").and_then(|v| v.as_f64()),
                humidity: body.get("humidity").and_then(|v| v.as_f64()),
                wind_speed: body.get("wind_speed").and_then(|v| v.as_f64()),
                soil_moisture: None,
                rain_24h_est: None,
                rain_1h_est: None,
            }),
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulate_mode_produces_both_rain_windows() {
        let s = WeatherOpenWeather::new(Client::new(), KeyMode::Simulate, "https://ow.example.com".into(), None);
        let cancel = CancellationToken::new();
        let raw = s.fetch("R001", "Region One", &cancel).await;
        let obs = s.normalize(&raw).unwrap();
        let met = obs.meteorology().unwrap();
        assert!(met.rain_1h.is_some());
        assert!(met.rain_24h.is_some());
    }
}
