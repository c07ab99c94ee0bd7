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

//! source reliability priors, spec §4.1's table. The registry itself lives
//! in `hazard_sources`/`hazard_engine`; the pipeline only needs the weight,
//! so a small static table avoids pulling the full `DataSource` trait in.

pub fn reliability_of(source_name: &str) -> f64 {
    match source_name {
        "weather_cma" => 0.92,
        "weather_amap" => 0.70,
        "weather_wu_api" => 0.62,
        "weather_openweather" => 0.65,
        "weather_scraper" => 0.45,
        "geology_cgs" => 0.88,
        "geology_scraper" => 0.40,
        _ => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_falls_back_to_midpoint_reliability() {
        assert_eq!(reliability_of("mystery_source"), 0.5);
    }

    #[test]
    fn known_sources_match_the_spec_table() {
        assert_eq!(reliability_of("weather_cma"), 0.92);
        assert_eq!(reliability_of("geology_scraper"), 0.40);
    }
}
