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

use clap::{Parser, Subcommand};
use hazard_engine::scheduler::Scheduler;
use hazard_engine::{run_error, Engine, RunMode, TriggerOptions};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "geo-hazard warning workflow engine")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// start a run and wait for it to finish
    Trigger {
        #[arg(long)]
        fast: bool,
        #[arg(long)]
        manual: bool,
        #[arg(long)]
        region_limit: Option<usize>,
        #[arg(long)]
        force_llm: bool,
    },
    /// report the current/last run's state
    Status,
    /// request cooperative cancellation of the active run
    Abort,
    /// release a stuck run lock
    Reset,
    /// synthesize a plausible Decision for every region and push it via the
    /// delta feed, without touching any source, the LLM, or the database
    DebugRandomize,
    /// reset the scraper rate limiter and cooldown table
    ResetScraperRuntime {
        #[arg(long)]
        clear_cache: bool,
    },
    /// run in the foreground, triggering a scheduled run every
    /// `scheduled_interval_minutes` until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let database_url = std::env::var("HAZARD_DATABASE_URL").unwrap_or_else(|_| "sqlite://hazard-engine.db?mode=rwc".to_string());
    let engine = Engine::bootstrap(&database_url, None).await?;

    match args.command {
        Command::Trigger { fast, manual, region_limit, force_llm } => {
            let mode = if fast {
                RunMode::Fast
            } else if manual {
                RunMode::Manual
            } else {
                RunMode::Full
            };
            let request_id = format!("cli-{}", rand::random::<u32>());
            let opts = TriggerOptions { mode, region_limit, force_llm };
            let state = engine.controller.trigger_sync(request_id, opts).await?;
            println!("{}", serde_json::to_string_pretty(&state).map_err(|e| e.to_string())?);
        }
        Command::Status => {
            let status = engine.controller.status().await;
            println!("{}", serde_json::to_string_pretty(&status).map_err(|e| e.to_string())?);
        }
        Command::Abort => {
            engine.controller.abort().await;
            println!("abort requested");
        }
        Command::Reset => {
            engine.controller.reset().await?;
            println!("run lock released");
        }
        Command::DebugRandomize => {
            engine.controller.debug_randomize().await?;
            println!("synthetic readings published for every region");
        }
        Command::ResetScraperRuntime { clear_cache } => {
            engine.controller.reset_scraper_runtime(clear_cache).await;
            println!("scraper runtime reset (clear_cache={clear_cache})");
        }
        Command::Serve => {
            let interval = std::time::Duration::from_secs(engine.config.scheduled_interval_minutes * 60);
            let scheduler = Scheduler::start(engine.controller.clone(), interval);
            tokio::signal::ctrl_c().await.map_err(|e| e.to_string())?;
            scheduler.stop();
            engine.controller.shutdown().await;
            println!("shutdown complete");
        }
    }

    Ok(())
}
