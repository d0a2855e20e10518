//! # System Config Repository
//!
//! Reads and writes the global SEO kill switch.

use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set, sea_query::OnConflict};

use crate::models::system_config::{self, ActiveModel, Entity as SystemConfig, SEO_ENABLED_KEY};

/// Repository for the `system_config` key/flag table
pub struct SystemConfigRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SystemConfigRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns whether the pipeline is enabled. A missing row reads as disabled.
    pub async fn seo_enabled(&self) -> Result<bool, DbErr> {
        let row = SystemConfig::find_by_id(SEO_ENABLED_KEY.to_string())
            .one(self.db)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to read kill switch");
                e
            })?;

        Ok(row.map(|r| r.enabled).unwrap_or(false))
    }

    /// Flips the kill switch, creating the row if it does not exist yet.
    pub async fn set_seo_enabled(&self, enabled: bool) -> Result<(), DbErr> {
        let row = ActiveModel {
            key: Set(SEO_ENABLED_KEY.to_string()),
            enabled: Set(enabled),
            updated_at: Set(Utc::now().into()),
        };

        SystemConfig::insert(row)
            .on_conflict(
                OnConflict::column(system_config::Column::Key)
                    .update_columns([
                        system_config::Column::Enabled,
                        system_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await?;

        tracing::info!(enabled, "SEO kill switch updated");
        Ok(())
    }
}
