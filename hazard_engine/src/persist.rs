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

//! transactional batch commit (spec §4.5 step 4): a batch's region updates
//! and new warning records land in one transaction, so a crash mid-batch
//! never leaves `regions.risk_level` disagreeing with the latest
//! `warnings` row — invariant (i) of spec §3.

use hazard_collector::db::Db;
use hazard_fusion::Decision;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub async fn commit_batch(db: &Db, decisions: &[Decision], created_at: i64, source_tag: &str) -> Result<(), PersistError> {
    let mut tx = db.pool().begin().await?;

    for decision in decisions {
        sqlx::query("update regions set risk_level = ?, last_updated_at = ? where code = ?")
            .bind(decision.level.as_str())
            .bind(created_at)
            .bind(&decision.region_code)
            .execute(&mut *tx)
            .await?;

        let meteorology = serde_json::to_string(&decision.to_meteorology_json())?;
        sqlx::query("insert into warnings (region_id, level, reason, meteorology, confidence, created_at, source) values (?, ?, ?, ?, ?, ?, ?)")
            .bind(&decision.region_code)
            .bind(decision.level.as_str())
            .bind(&decision.reason)
            .bind(meteorology)
            .bind(decision.confidence)
            .bind(created_at)
            .bind(source_tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
