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

//! Shared utilities for the hazard warning workflow engine: time helpers,
//! a haversine distance for the neighbor-influence stage, a process-wide
//! token-bucket rate limiter with per-domain cooldown, and a generic
//! in-memory TTL store used as the first cache tier by `hazard_collector`.

pub mod datetime;
pub mod geo;
pub mod rate_limit;
pub mod store;
pub mod ids;
