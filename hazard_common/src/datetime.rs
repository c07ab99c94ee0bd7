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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// millisecond-resolution UTC timestamp, serialized as an integer rather than
/// an RFC3339 string so it round-trips through the durable key/value store
/// without a timezone-aware parser.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpochMillis(i64);

impl EpochMillis {
    pub fn now() -> Self {
        EpochMillis(Utc::now().timestamp_millis())
    }

    pub fn new(millis: i64) -> Self {
        EpochMillis(millis)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.0).unwrap_or_else(Utc::now)
    }

    pub fn elapsed_since(&self, other: EpochMillis) -> Duration {
        let diff = (self.0 - other.0).max(0);
        Duration::from_millis(diff as u64)
    }
}

impl From<DateTime<Utc>> for EpochMillis {
    fn from(dt: DateTime<Utc>) -> Self {
        EpochMillis(dt.timestamp_millis())
    }
}

impl From<EpochMillis> for DateTime<Utc> {
    fn from(e: EpochMillis) -> Self {
        e.to_datetime()
    }
}

#[inline]
pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[inline]
pub fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

#[inline]
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// true if `stamp` is older than `timeout` relative to now — used by the
/// run lock's heartbeat-eviction check and by cache TTL lookups.
pub fn is_stale(stamp: EpochMillis, timeout: Duration) -> bool {
    EpochMillis::now().elapsed_since(stamp) > timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_since_is_monotonic_nonnegative() {
        let a = EpochMillis::new(1_000);
        let b = EpochMillis::new(1_500);
        assert_eq!(b.elapsed_since(a), Duration::from_millis(500));
        // clock skew / out-of-order timestamps never go negative
        assert_eq!(a.elapsed_since(b), Duration::from_millis(0));
    }

    #[test]
    fn is_stale_respects_timeout() {
        let old = EpochMillis::new(EpochMillis::now().millis() - 120_000);
        assert!(is_stale(old, Duration::from_secs(90)));
        assert!(!is_stale(EpochMillis::now(), Duration::from_secs(90)));
    }
}
