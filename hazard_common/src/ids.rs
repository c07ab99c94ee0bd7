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
use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

/// stable (non-randomized) hash used to derive the rotating-window offset
/// from a `request_id`. `DefaultHasher`'s algorithm is not guaranteed across
/// Rust versions in general, but its seed is fixed (unlike `RandomState`),
/// so within one build it is stable across calls — which is all §4.7 needs.
pub fn stable_hash(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
