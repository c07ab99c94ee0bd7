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
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// closed taxonomy of non-fatal source errors, spec §4.1 / §7.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Disabled,
    DomainNotAllowed,
    SlugNotFound,
    HttpStatus(u16),
    HtmlParseNoMetrics,
    UrlCollision,
    RateLimited,
    ConnectError,
    Timeout,
    AuthFailed,
    KeyDiscoveryFailed,
    NoStationMapped,
    Cancelled,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceErrorKind::Disabled => write!(f, "disabled"),
            SourceErrorKind::DomainNotAllowed => write!(f, "domain_not_allowed"),
            SourceErrorKind::SlugNotFound => write!(f, "slug_not_found"),
            SourceErrorKind::HttpStatus(code) => write!(f, "http_status_{code}"),
            SourceErrorKind::HtmlParseNoMetrics => write!(f, "html_parse_no_metrics"),
            SourceErrorKind::UrlCollision => write!(f, "url_collision"),
            SourceErrorKind::RateLimited => write!(f, "rate_limited"),
            SourceErrorKind::ConnectError => write!(f, "connect_error"),
            SourceErrorKind::Timeout => write!(f, "timeout"),
            SourceErrorKind::AuthFailed => write!(f, "auth_failed"),
            SourceErrorKind::KeyDiscoveryFailed => write!(f, "key_discovery_failed"),
            SourceErrorKind::NoStationMapped => write!(f, "no_station_mapped"),
            SourceErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// internal/programming errors within the sources crate (config loading,
/// malformed station tables). These are distinct from `SourceErrorKind`,
/// which is the non-fatal per-fetch taxonomy that flows through `RawPayload`.
#[derive(Error, Debug)]
pub enum HazardSourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("station table parse error: {0}")]
    StationTable(String),
}
