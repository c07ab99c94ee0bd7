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

//! `RunState` (spec §3): the single process-wide run handle, mirrored into
//! the durable `run:lock` key so a restarted process observes a stale lock
//! rather than silently double-running.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Fast,
    Full,
    Manual,
    Scheduled,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Fast => "fast",
            RunMode::Full => "full",
            RunMode::Manual => "manual",
            RunMode::Scheduled => "scheduled",
        }
    }
}

/// run errors, spec §7: terminal for the current run, never crash the process.
pub mod run_error {
    pub const MANUAL_ABORT: &str = "manual_abort";
    pub const HEARTBEAT_LOST: &str = "heartbeat_lost";
    pub const ALREADY_RUNNING: &str = "already_running";

    pub fn partial_timeout(seconds: u64) -> String {
        format!("workflow_partial_timeout_after_{seconds}")
    }

    pub fn internal(tag: &str) -> String {
        format!("internal:{tag}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunState {
    pub request_id: String,
    pub started_at: i64,
    pub selected_regions: usize,
    pub total_regions: usize,
    pub processed_regions: usize,
    pub mode: RunMode,
    pub abort_requested: bool,
    pub heartbeat_at: i64,
    pub last_error: Option<String>,
    pub last_finished_at: Option<i64>,
    pub last_processed_regions: Option<usize>,
}

impl RunState {
    pub fn new(request_id: String, mode: RunMode, now_millis: i64) -> Self {
        RunState {
            request_id,
            started_at: now_millis,
            selected_regions: 0,
            total_regions: 0,
            processed_regions: 0,
            mode,
            abort_requested: false,
            heartbeat_at: now_millis,
            last_error: None,
            last_finished_at: None,
            last_processed_regions: None,
        }
    }

    pub fn is_heartbeat_stale(&self, now_millis: i64, timeout_seconds: u64) -> bool {
        now_millis - self.heartbeat_at > (timeout_seconds as i64) * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_is_not_stale() {
        let state = RunState::new("req-1".into(), RunMode::Full, 10_000);
        assert!(!state.is_heartbeat_stale(10_500, 90));
    }

    #[test]
    fn old_heartbeat_is_stale() {
        let state = RunState::new("req-1".into(), RunMode::Full, 0);
        assert!(state.is_heartbeat_stale(200_000, 90));
    }
}
