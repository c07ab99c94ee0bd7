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

//! interval-driven `RunMode::Scheduled` trigger (SPEC_FULL.md §10), grounded
//! in the teacher's `odin_job::JobScheduler` but trimmed to the one repeating
//! action this engine needs: "run the workflow every N minutes unless one is
//! already in flight". `odin_job`'s generic `FnMut` job queue (and its
//! `kanal` channel) would be pure overhead for a single fixed action, so this
//! is a plain `tokio::time::interval` loop instead.

use crate::controller::{RunController, TriggerOptions};
use crate::run_state::RunMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// owns the background timer task; dropping or calling `stop` cancels the
/// timer but never touches a run already in flight.
pub struct Scheduler {
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(controller: Arc<RunController>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately, we don't want that
            loop {
                ticker.tick().await;
                if controller.status().await.running {
                    warn!("scheduled trigger skipped: a run is already in flight");
                    continue;
                }
                let request_id = format!("scheduled-{}", rand::random::<u32>());
                let opts = TriggerOptions { mode: RunMode::Scheduled, region_limit: None, force_llm: false };
                match controller.trigger_async(request_id.clone(), opts).await {
                    Ok(_) => info!(request_id = %request_id, "scheduled run triggered"),
                    Err(e) => warn!(request_id = %request_id, error = %e, "scheduled trigger rejected"),
                }
            }
        });
        Scheduler { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
