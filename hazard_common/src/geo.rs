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
//! minimal geographic primitives. The teacher crate carries a full
//! `uom`/`geo`-backed coordinate stack (ellipsoid-aware distances, ECEF
//! conversions) for cartographic rendering; this engine only ever needs a
//! stable ordering of "nearby" regions for the neighbor-influence stage, so
//! we keep a plain haversine great-circle distance instead.

const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    /// great-circle distance in kilometers
    pub fn haversine_distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }
}

/// returns the indices of the `k` nearest centroids to `points[at]`, excluding `at` itself,
/// stable-sorted by distance then by index so repeated calls on the same input are deterministic.
pub fn k_nearest(points: &[Option<GeoPoint>], at: usize, k: usize) -> Vec<usize> {
    let Some(origin) = points.get(at).copied().flatten() else {
        return Vec::new();
    };

    let mut dists: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != at)
        .filter_map(|(i, p)| p.map(|p| (i, origin.haversine_distance_km(&p))))
        .collect();

    dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
    dists.into_iter().take(k).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(30.0, 104.0);
        assert!(p.haversine_distance_km(&p) < 1e-9);
    }

    #[test]
    fn k_nearest_excludes_origin_and_missing() {
        let points = vec![
            Some(GeoPoint::new(30.0, 104.0)), // origin
            Some(GeoPoint::new(30.1, 104.1)), // close
            None,                             // missing centroid
            Some(GeoPoint::new(40.0, 114.0)), // far
        ];
        let nearest = k_nearest(&points, 0, 2);
        assert_eq!(nearest, vec![1, 3]);
    }
}
