//! # City Registry Repository
//!
//! Lookup and batch upsert of per-location SEO control state.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::OnConflict,
};

use crate::models::city_registry::{self, ActiveModel, Entity as CityRegistry, Model};

/// Repository for `city_registry` rows
pub struct CityRegistryRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CityRegistryRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_key(&self, location_key: &str) -> Result<Option<Model>, DbErr> {
        CityRegistry::find_by_id(location_key.to_string())
            .one(self.db)
            .await
    }

    /// Current rows for the given keys, indexed by location key.
    pub async fn find_by_keys(&self, keys: &[String]) -> Result<HashMap<String, Model>, DbErr> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = CityRegistry::find()
            .filter(city_registry::Column::LocationKey.is_in(keys.iter().cloned()))
            .all(self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.location_key.clone(), row))
            .collect())
    }

    /// Subset of `keys` whose registry row is frozen.
    pub async fn frozen_keys(&self, keys: &[String]) -> Result<HashSet<String>, DbErr> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let frozen: Vec<String> = CityRegistry::find()
            .select_only()
            .column(city_registry::Column::LocationKey)
            .filter(city_registry::Column::LocationKey.is_in(keys.iter().cloned()))
            .filter(city_registry::Column::IsFrozen.eq(true))
            .into_tuple()
            .all(self.db)
            .await?;

        Ok(frozen.into_iter().collect())
    }

    pub async fn list(&self) -> Result<Vec<Model>, DbErr> {
        CityRegistry::find()
            .order_by_asc(city_registry::Column::LocationKey)
            .all(self.db)
            .await
    }

    /// Inserts or updates every row in one statement, keyed on `location_key`.
    /// `created_at` is only written on insert.
    pub async fn upsert_many(&self, rows: Vec<ActiveModel>) -> Result<u64, DbErr> {
        if rows.is_empty() {
            return Ok(0);
        }

        CityRegistry::insert_many(rows)
            .on_conflict(
                OnConflict::column(city_registry::Column::LocationKey)
                    .update_columns([
                        city_registry::Column::Priority,
                        city_registry::Column::IsFrozen,
                        city_registry::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
    }
}
