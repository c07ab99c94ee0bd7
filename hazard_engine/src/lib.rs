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

//! Run Controller & Engine Bootstrap (spec §3-§7, component C5 plus the
//! region table, selector, delta publisher, and persistence glue around it).
//! `Engine::bootstrap` wires configuration, the database, the credential
//! store, and an optional LLM client into one `RunController` the CLI binary
//! drives.

pub mod controller;
pub mod delta;
pub mod persist;
pub mod region;
pub mod run_state;
pub mod scheduler;
pub mod selector;

use hazard_collector::cache::DurableCredentialStore;
use hazard_collector::db::Db;
use hazard_config::EngineConfig;
use hazard_fusion::llm::LlmClient;
use std::sync::Arc;

pub use controller::{RunController, RunStatus, TriggerOptions};
pub use run_state::{run_error, RunMode, RunState};

/// process bootstrap: loads configuration, opens the database, and builds
/// the one `RunController` the binary's CLI subcommands drive.
pub struct Engine {
    pub config: EngineConfig,
    pub controller: Arc<RunController>,
}

impl Engine {
    pub async fn bootstrap(database_url: &str, llm_client: Option<Arc<dyn LlmClient>>) -> Result<Self, String> {
        let config = EngineConfig::load().map_err(|e| e.to_string())?;
        let db = Db::connect(database_url).await.map_err(|e| e.to_string())?;
        let credentials: Arc<dyn hazard_sources::CredentialStore> = Arc::new(DurableCredentialStore::new(db.clone()));
        let controller = Arc::new(RunController::new(config.clone(), db, credentials, llm_client).map_err(|e| e.to_string())?);
        Ok(Engine { config, controller })
    }
}
