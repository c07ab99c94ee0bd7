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
#![allow(unused)]

//! `EngineConfig` is loaded in three layers, closest-wins: built-in defaults,
//! an optional RON file (`HAZARD_CONFIG_FILE`), then the environment
//! variables enumerated below. This mirrors the teacher's
//! `odin_build::load_config` (RON-based, filesystem-first) minus its
//! build-time asset-embedding machinery, which this engine has no use for.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct EngineConfig {
    pub workflow_max_runtime_seconds: u64,
    pub workflow_manual_region_limit: usize,
    pub heartbeat_timeout_seconds: u64,

    pub collector_max_concurrency: usize,
    pub scraper_max_parallel_requests: usize,

    pub scraper_allowed_domains: Vec<String>,
    pub scraper_request_interval_seconds: f64,
    pub scraper_max_requests_per_window: usize,
    pub scraper_request_window_seconds: u64,
    pub scraper_cache_minutes: u64,
    pub scraper_timeout_seconds: u64,
    pub scraper_cooldown_base_seconds: u64,
    pub scraper_cooldown_max_seconds: u64,
    pub city_level_only: bool,

    pub wu_enabled: bool,
    pub wu_key_discovery_url: Option<String>,
    pub wu_key_refresh_minutes: u64,
    pub wu_timeout_seconds: u64,

    pub enable_llm_refinement: bool,
    pub llm_refine_max_regions: usize,
    pub llm_confidence_threshold: f64,
    pub llm_change_threshold: f64,

    pub neighbor_influence_weight: f64,
    pub neighbor_k: usize,

    pub high_risk_head_size: usize,

    pub historical_pressure_window_years: i64,

    /// interval for the optional `RunMode::Scheduled` timer; a run is skipped
    /// (not queued) if one is already in flight when the interval elapses.
    pub scheduled_interval_minutes: u64,

    /// local-risk feature weights, spec §4.4. Absent entries are treated as
    /// zero; present weights are renormalized by the scoring stage whenever
    /// a feature is missing for a given region, never silently zeroed.
    pub local_risk_weights: HashMap<String, f64>,

    /// per-source credential value: absent/placeholder = disabled, the literal
    /// string `"simulate"` = simulate mode, anything else = live key/token.
    pub source_credentials: HashMap<String, String>,

    /// offline-built `region_code -> station_id` table for `weather_cma`
    pub cma_station_table_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workflow_max_runtime_seconds: 1800,
            workflow_manual_region_limit: 30,
            heartbeat_timeout_seconds: 90,

            collector_max_concurrency: 16,
            scraper_max_parallel_requests: 4,

            scraper_allowed_domains: Vec::new(),
            scraper_request_interval_seconds: 1.0,
            scraper_max_requests_per_window: 60,
            scraper_request_window_seconds: 60,
            scraper_cache_minutes: 30,
            scraper_timeout_seconds: 10,
            scraper_cooldown_base_seconds: 30,
            scraper_cooldown_max_seconds: 3600,
            city_level_only: false,

            wu_enabled: false,
            wu_key_discovery_url: None,
            wu_key_refresh_minutes: 60,
            wu_timeout_seconds: 10,

            enable_llm_refinement: false,
            llm_refine_max_regions: 20,
            llm_confidence_threshold: 0.55,
            llm_change_threshold: 0.15,

            neighbor_influence_weight: 0.2,
            neighbor_k: 5,

            high_risk_head_size: 20,

            historical_pressure_window_years: 10,

            scheduled_interval_minutes: 60,

            local_risk_weights: [
                ("rain_24h", 0.22),
                ("rain_1h", 0.13),
                ("soil_moisture", 0.10),
                ("slope", 0.20),
                ("fault_distance", 0.12),
                ("lithology_risk", 0.10),
                ("historical_pressure", 0.08),
                ("wind_speed", 0.05),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),

            source_credentials: HashMap::new(),
            cma_station_table_path: None,
        }
    }
}

impl EngineConfig {
    pub fn batch_size(&self) -> usize {
        (self.collector_max_concurrency * 2).clamp(15, 40)
    }

    /// layer 2: overlay an optional RON config file onto the defaults
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        ron::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// layer 3: overlay the environment variables named in the spec's §6 table
    pub fn apply_env(mut self) -> Result<Self> {
        macro_rules! env_u64 {
            ($field:ident, $var:literal) => {
                if let Ok(v) = env::var($var) {
                    self.$field = v.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: $var.to_string(),
                        reason: format!("expected integer, got {v:?}"),
                    })?;
                }
            };
        }
        macro_rules! env_f64 {
            ($field:ident, $var:literal) => {
                if let Ok(v) = env::var($var) {
                    self.$field = v.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: $var.to_string(),
                        reason: format!("expected float, got {v:?}"),
                    })?;
                }
            };
        }
        macro_rules! env_bool {
            ($field:ident, $var:literal) => {
                if let Ok(v) = env::var($var) {
                    self.$field = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes");
                }
            };
        }

        env_u64!(workflow_max_runtime_seconds, "WORKFLOW_MAX_RUNTIME_SECONDS");
        env_u64!(workflow_manual_region_limit, "WORKFLOW_MANUAL_REGION_LIMIT");
        env_u64!(collector_max_concurrency, "COLLECTOR_MAX_CONCURRENCY");
        env_bool!(enable_llm_refinement, "ENABLE_LLM_REFINEMENT");
        env_u64!(llm_refine_max_regions, "LLM_REFINE_MAX_REGIONS");
        env_f64!(llm_confidence_threshold, "LLM_CONFIDENCE_THRESHOLD");
        env_f64!(neighbor_influence_weight, "NEIGHBOR_INFLUENCE_WEIGHT");
        env_u64!(scheduled_interval_minutes, "SCHEDULED_INTERVAL_MINUTES");

        if let Ok(v) = env::var("SCRAPER_ALLOWED_DOMAINS") {
            self.scraper_allowed_domains = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        env_f64!(scraper_request_interval_seconds, "SCRAPER_REQUEST_INTERVAL_SECONDS");
        env_u64!(scraper_max_parallel_requests, "SCRAPER_MAX_PARALLEL_REQUESTS");
        env_u64!(scraper_max_requests_per_window, "SCRAPER_MAX_REQUESTS_PER_WINDOW");
        env_u64!(scraper_cache_minutes, "SCRAPER_CACHE_MINUTES");

        env_bool!(wu_enabled, "WU_ENABLED");
        if let Ok(v) = env::var("WU_KEY_DISCOVERY_URL") {
            self.wu_key_discovery_url = Some(v);
        }
        env_u64!(wu_key_refresh_minutes, "WU_KEY_REFRESH_MINUTES");

        for (var, value) in env::vars() {
            if let Some(source) = var.strip_prefix("HAZARD_SOURCE_KEY_") {
                self.source_credentials.insert(source.to_ascii_lowercase(), value);
            }
        }

        Ok(self)
    }

    /// full three-layer load: defaults -> optional `HAZARD_CONFIG_FILE` -> env vars
    pub fn load() -> Result<Self> {
        let base = match env::var("HAZARD_CONFIG_FILE") {
            Ok(path) => Self::load_file(path)?,
            Err(_) => EngineConfig::default(),
        };
        base.apply_env()
    }
}
