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
//! geology-channel scraper counterpart to `weather_scraper`. Same guardrail
//! sequence, lowest reliability in the geology channel since it fills in for
//! regions CGS does not cover.

use crate::{
    sources::simulated_f64, scraper_guard::ScraperGuard, Channel, ChannelObservation, DataSource,
    GeologyObservation, KeyMode, NormalizedObservation, QualityNote, RawPayload, SourceError, SourceErrorKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NAME: &str = "geology_scraper";
const RELIABILITY: f64 = 0.40;

pub struct GeologyScraper {
    client: Client,
    key_mode: KeyMode,
    url_template: String,
    guard: Arc<ScraperGuard>,
}

impl GeologyScraper {
    pub fn new(client: Client, key_mode: KeyMode, url_template: String, guard: Arc<ScraperGuard>) -> Self {
        GeologyScraper { client, key_mode, url_template, guard }
    }

    fn build_url(&self, slug: &str) -> String {
        self.url_template.replace("{slug}", slug)
    }
}

#[async_trait]
impl DataSource for GeologyScraper {
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
            return RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Disabled, "scraper disabled"));
        }

        let slug = match self.guard.resolve_slug(region_name) {
            Ok(s) => s,
            Err(e) => return RawPayload::err(NAME, region_code, e),
        };
        let url = self.build_url(&slug);

        let Some(domain) = ScraperGuard::domain_of(&url) else {
            return RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::DomainNotAllowed, "malformed URL").with_url(&url));
        };

        if let Err(e) = self.guard.check_domain(&domain) {
            return RawPayload::err(NAME, region_code, e);
        }
        if let Err(e) = self.guard.check_cooldown(&domain) {
            return RawPayload::err(NAME, region_code, e);
        }
        if let Err(e) = self.guard.check_rate_limit() {
            return RawPayload::err(NAME, region_code, e);
        }
        if let Err(e) = self.guard.claim_url(&url, region_code) {
            return RawPayload::err(NAME, region_code, e);
        }

        if self.key_mode == KeyMode::Simulate {
            let body = json!({
                "slope": simulated_f64(region_code, 30, 0.0, 45.0),
                "lithology_risk": simulated_f64(region_code, 31, 0.0, 1.0),
                "simulated": true,
            });
            return RawPayload::ok(NAME, region_code, body);
        }

        tokio::select! {
            _ = cancel.cancelled() => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::Cancelled, "cancelled").with_url(&url)),
            resp = self.client.get(&url).send() => {
                match resp {
                    Ok(r) if r.status().is_success() => {
                        match r.text().await {
                            Ok(html) => match parse_geology_from_html(&html) {
                                Some(body) => RawPayload::ok(NAME, region_code, body),
                                None => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HtmlParseNoMetrics, "no metrics found").with_url(&url)),
                            },
                            Err(e) => RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HtmlParseNoMetrics, e.to_string()).with_url(&url)),
                        }
                    }
                    Ok(r) if r.status().as_u16() == 403 || r.status().as_u16() == 429 => {
                        self.guard.record_blocked_response(&domain, r.status().as_u16());
                        RawPayload::err(NAME, region_code, SourceError::new(SourceErrorKind::HttpStatus(r.status().as_u16()), "blocked").with_url(&url).with_status(r.status().as_u16()))
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
                historical_event_count: None,
            }),
            notes,
        })
    }
}

fn parse_geology_from_html(html: &str) -> Option<serde_json::Value> {
    let re = regex::Regex::new(r"slope=(\d+(?:\.\d+)?)").ok()?;
    let caps = re.captures(html)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(json!({ "slope": value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn guard() -> Arc<ScraperGuard> {
        Arc::new(ScraperGuard::new(
            vec!["geology.example.com".to_string()],
            false,
            Duration::from_millis(0),
            Duration::from_secs(60),
            1000,
            Duration::from_secs(30),
            Duration::from_secs(3600),
        ))
    }

    #[tokio::test]
    async fn disabled_short_circuits_before_slug_resolution() {
        let s = GeologyScraper::new(Client::new(), KeyMode::Disabled, "https://geology.example.com/{slug}".into(), guard());
        let cancel = CancellationToken::new();
        let raw = s.fetch("R001", "Region One", &cancel).await;
        assert_eq!(raw.error.unwrap().kind, SourceErrorKind::Disabled);
    }

    #[tokio::test]
    async fn simulate_mode_round_trips_through_normalize() {
        let s = GeologyScraper::new(Client::new(), KeyMode::Simulate, "https://geology.example.com/{slug}".into(), guard());
        let cancel = CancellationToken::new();
        let raw = s.fetch("R001", "Region One", &cancel).await;
        assert!(raw.success);
        let obs = s.normalize(&raw).unwrap();
        assert!(obs.geology().unwrap().slope.is_some());
    }

    #[test]
    fn html_parser_requires_slope_marker() {
        assert!(parse_geology_from_html("<html></html>").is_none());
        assert!(parse_geology_from_html("slope=12.0").is_some());
    }
}
