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
pub mod weather_cma;
pub mod weather_amap;
pub mod weather_wu_api;
pub mod weather_openweather;
pub mod weather_scraper;
pub mod geology_cgs;
pub mod geology_scraper;

pub(crate) fn simulated_f64(seed: &str, salt: u64, lo: f64, hi: f64) -> f64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    salt.hash(&mut hasher);
    let h = hasher.finish();
    let frac = (h % 10_000) as f64 / 10_000.0;
    lo + frac * (hi - lo)
}
