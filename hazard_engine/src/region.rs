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

//! `Region` (spec §3): externally owned, the engine only ever reads it and
//! updates `risk_level`/`last_updated_at` on commit.

use hazard_collector::db::Db;
use serde::{Deserialize, Serialize};
use sqlx::Row;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub code: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub risk_level: String,
    pub last_updated_at: i64,
}

pub async fn load_all(db: &Db) -> Result<Vec<Region>, sqlx::Error> {
    let rows = sqlx::query("select code, name, lat, lon, risk_level, last_updated_at from regions order by code").fetch_all(db.pool()).await?;
    rows.into_iter()
        .map(|row| {
            Ok(Region {
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                lat: row.try_get("lat")?,
                lon: row.try_get("lon")?,
                risk_level: row.try_get("risk_level")?,
                last_updated_at: row.try_get("last_updated_at")?,
            })
        })
        .collect()
}

/// test/bootstrap helper: the engine never creates regions on its own in
/// production (they are externally owned), but integration tests need a
/// seeded table to select from.
pub async fn upsert_region(db: &Db, region: &Region) -> Result<(), sqlx::Error> {
    sqlx::query(
        "insert into regions (code, name, lat, lon, risk_level, last_updated_at) values (?, ?, ?, ?, ?, ?)
         on conflict(code) do update set name = excluded.name, lat = excluded.lat, lon = excluded.lon",
    )
    .bind(&region.code)
    .bind(&region.name)
    .bind(region.lat)
    .bind(region.lon)
    .bind(&region.risk_level)
    .bind(region.last_updated_at)
    .execute(db.pool())
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_through_the_regions_table() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        let region = Region { code: "R001".into(), name: "Region One".into(), lat: Some(30.0), lon: Some(104.0), risk_level: "green".into(), last_updated_at: 0 };
        upsert_region(&db, &region).await.unwrap();
        let all = load_all(&db).await.unwrap();
        assert_eq!(all, vec![region]);
    }
}
