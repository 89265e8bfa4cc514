//! Postgres store.
//!
//! Queries use the runtime-checked `query_as` API so the crate builds without
//! a reachable database.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::model::User;
use crate::estimate::model::{Estimate, PaverBlockType, PaverBlockTypeForm, ValidatedEstimate};

const ESTIMATE_COLUMNS: &str = "id, party_name, date, paver_block_type_id, price, gst_percentage, \
     gst_amount, transportation_charge, loading_unloading_cost, total_amount, notes, created_by, \
     created_at, updated_at";

const PAVER_BLOCK_COLUMNS: &str = "id, name, description, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn map_estimate_write_error(err: sqlx::Error, paver_block_type_id: i64) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::UnknownPaverBlockType(paver_block_type_id)
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count_users(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateUsername(username.to_string())
            }
            _ => StoreError::Database(err),
        })
    }

    async fn list_paver_block_types(&self) -> Result<Vec<PaverBlockType>, StoreError> {
        let types = sqlx::query_as::<_, PaverBlockType>(&format!(
            "SELECT {PAVER_BLOCK_COLUMNS} FROM paver_block_types ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    async fn get_paver_block_type(&self, id: i64) -> Result<Option<PaverBlockType>, StoreError> {
        let found = sqlx::query_as::<_, PaverBlockType>(&format!(
            "SELECT {PAVER_BLOCK_COLUMNS} FROM paver_block_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found)
    }

    async fn create_paver_block_type(
        &self,
        form: &PaverBlockTypeForm,
    ) -> Result<PaverBlockType, StoreError> {
        let created = sqlx::query_as::<_, PaverBlockType>(&format!(
            "INSERT INTO paver_block_types (name, description) VALUES ($1, $2) \
             RETURNING {PAVER_BLOCK_COLUMNS}"
        ))
        .bind(form.name.trim())
        .bind(form.description.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_paver_block_type(
        &self,
        id: i64,
        form: &PaverBlockTypeForm,
    ) -> Result<Option<PaverBlockType>, StoreError> {
        let updated = sqlx::query_as::<_, PaverBlockType>(&format!(
            "UPDATE paver_block_types SET name = $1, description = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {PAVER_BLOCK_COLUMNS}"
        ))
        .bind(form.name.trim())
        .bind(form.description.trim())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn count_estimates_using(&self, paver_block_type_id: i64) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM estimates WHERE paver_block_type_id = $1")
                .bind(paver_block_type_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn delete_paver_block_type(&self, id: i64) -> Result<bool, StoreError> {
        // estimates go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM paver_block_types WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_estimates(&self, owner: Uuid) -> Result<Vec<Estimate>, StoreError> {
        let estimates = sqlx::query_as::<_, Estimate>(&format!(
            "SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE created_by = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(estimates)
    }

    async fn get_estimate(&self, owner: Uuid, id: i64) -> Result<Option<Estimate>, StoreError> {
        let estimate = sqlx::query_as::<_, Estimate>(&format!(
            "SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE id = $1 AND created_by = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(estimate)
    }

    async fn create_estimate(
        &self,
        owner: Uuid,
        estimate: &ValidatedEstimate,
    ) -> Result<Estimate, StoreError> {
        sqlx::query_as::<_, Estimate>(&format!(
            r#"
            INSERT INTO estimates (party_name, date, paver_block_type_id, price, gst_percentage,
                gst_amount, transportation_charge, loading_unloading_cost, total_amount, notes,
                created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ESTIMATE_COLUMNS}
            "#
        ))
        .bind(estimate.party_name())
        .bind(estimate.date())
        .bind(estimate.paver_block_type_id())
        .bind(estimate.price())
        .bind(estimate.gst_percentage())
        .bind(estimate.gst_amount())
        .bind(estimate.transportation_charge())
        .bind(estimate.loading_unloading_cost())
        .bind(estimate.total_amount())
        .bind(estimate.notes())
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| map_estimate_write_error(err, estimate.paver_block_type_id()))
    }

    async fn update_estimate(
        &self,
        owner: Uuid,
        id: i64,
        estimate: &ValidatedEstimate,
    ) -> Result<Option<Estimate>, StoreError> {
        sqlx::query_as::<_, Estimate>(&format!(
            r#"
            UPDATE estimates
            SET party_name = $1, date = $2, paver_block_type_id = $3, price = $4,
                gst_percentage = $5, gst_amount = $6, transportation_charge = $7,
                loading_unloading_cost = $8, total_amount = $9, notes = $10, updated_at = NOW()
            WHERE id = $11 AND created_by = $12
            RETURNING {ESTIMATE_COLUMNS}
            "#
        ))
        .bind(estimate.party_name())
        .bind(estimate.date())
        .bind(estimate.paver_block_type_id())
        .bind(estimate.price())
        .bind(estimate.gst_percentage())
        .bind(estimate.gst_amount())
        .bind(estimate.transportation_charge())
        .bind(estimate.loading_unloading_cost())
        .bind(estimate.total_amount())
        .bind(estimate.notes())
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_estimate_write_error(err, estimate.paver_block_type_id()))
    }

    async fn delete_estimate(&self, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM estimates WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
