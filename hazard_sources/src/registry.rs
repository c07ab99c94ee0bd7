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
//! wires the seven built-in `DataSource` adapters from configuration,
//! spec §4.1's source table. A single `ScraperGuard` is shared by the two
//! scraper-style sources since the guard's rate limiter and URL-collision
//! map are run-scoped, not per-source.

use crate::errors::HazardSourceError;
use crate::sources::{
    geology_cgs::GeologyCgs, geology_scraper::GeologyScraper, weather_amap::WeatherAmap,
    weather_cma::WeatherCma, weather_openweather::WeatherOpenWeather, weather_scraper::WeatherScraper,
    weather_wu_api::WeatherWuApi,
};
use crate::{key_mode_from_credential, CredentialStore, DataSource};
use crate::scraper_guard::ScraperGuard;
use hazard_config::EngineConfig;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SCRAPER_WEATHER_URL: &str = "https://weather.example.com/region/{slug}";
const DEFAULT_SCRAPER_GEOLOGY_URL: &str = "https://geology.example.com/region/{slug}";

/// loads the offline-built `region_code -> station_id` table a line at a time,
/// `region_code,station_id` per line. Returns an empty map if no path was
/// configured, which pushes every region through `NoStationMapped`.
pub fn load_station_table(path: Option<&str>) -> Result<HashMap<String, String>, HazardSourceError> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let data = std::fs::read_to_string(path)?;
    let mut table = HashMap::new();
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, ',');
        let (Some(region), Some(station)) = (parts.next(), parts.next()) else {
            return Err(HazardSourceError::StationTable(format!("malformed line {} in {path:?}", lineno + 1)));
        };
        table.insert(region.trim().to_string(), station.trim().to_string());
    }
    Ok(table)
}

/// the registry plus the run-scoped guard that the engine must clear
/// (`reset_run_scoped_state`) at the start of every run — the guard itself
/// is a process-lifetime singleton (its rate limiter and cooldown table are
/// process-wide per spec §5), but its URL-collision map is per-run.
pub struct SourceRegistry {
    pub sources: Arc<Vec<Box<dyn DataSource>>>,
    pub scraper_guard: Arc<ScraperGuard>,
}

pub fn build_registry(config: &EngineConfig, credentials: Arc<dyn CredentialStore>) -> Result<SourceRegistry, HazardSourceError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.scraper_timeout_seconds))
        .build()
        .unwrap_or_default();

    let creds = &config.source_credentials;
    let key_mode_for = |name: &str| key_mode_from_credential(creds.get(name).map(|s| s.as_str()));

    let scraper_guard = Arc::new(ScraperGuard::new(
        config.scraper_allowed_domains.clone(),
        config.city_level_only,
        Duration::from_secs_f64(config.scraper_request_interval_seconds),
        Duration::from_secs(config.scraper_request_window_seconds),
        config.scraper_max_requests_per_window,
        Duration::from_secs(config.scraper_cooldown_base_seconds),
        Duration::from_secs(config.scraper_cooldown_max_seconds),
    ));

    let station_table = load_station_table(config.cma_station_table_path.as_deref())?;

    let mut sources: Vec<Box<dyn DataSource>> = Vec::new();

    sources.push(Box::new(WeatherCma::new(
        client.clone(),
        key_mode_for("weather_cma"),
        "https://cma.example.com".to_string(),
        station_table,
    )));

    sources.push(Box::new(WeatherAmap::new(
        client.clone(),
        key_mode_for("weather_amap"),
        "https://amap.example.com".to_string(),
        creds.get("weather_amap").cloned(),
    )));

    let wu_key_mode = if config.wu_enabled { key_mode_for("weather_wu_api") } else { crate::KeyMode::Disabled };
    sources.push(Box::new(WeatherWuApi::new(
        client.clone(),
        wu_key_mode,
        "https://wu.example.com".to_string(),
        creds.get("weather_wu_api").cloned(),
        config.wu_key_discovery_url.clone(),
        Duration::from_secs(config.wu_key_refresh_minutes * 60),
        credentials,
    )));

    sources.push(Box::new(WeatherOpenWeather::new(
        client.clone(),
        key_mode_for("weather_openweather"),
        "https://openweather.example.com".to_string(),
        creds.get("weather_openweather").cloned(),
    )));

    sources.push(Box::new(WeatherScraper::new(
        client.clone(),
        key_mode_for("weather_scraper"),
        DEFAULT_SCRAPER_WEATHER_URL.to_string(),
        scraper_guard.clone(),
    )));

    sources.push(Box::new(GeologyCgs::new(
        client.clone(),
        key_mode_for("geology_cgs"),
        "https://cgs.example.com".to_string(),
        creds.get("geology_cgs").cloned(),
    )));

    sources.push(Box::new(GeologyScraper::new(
        client,
        key_mode_for("geology_scraper"),
        DEFAULT_SCRAPER_GEOLOGY_URL.to_string(),
        scraper_guard.clone(),
    )));

    Ok(SourceRegistry { sources: Arc::new(sources), scraper_guard })
}
