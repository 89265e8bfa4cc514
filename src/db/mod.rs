//! Database module - AppState and the persistence seam
//!
//! - `memory` - in-process store, used when no database is configured and in tests
//! - `postgres` - sqlx/Postgres store with embedded migrations
//!
//! Estimates are always looked up together with their owner; a record owned
//! by someone else is indistinguishable from a missing one.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::model::User;
use crate::config::AppConfig;
use crate::estimate::model::{Estimate, PaverBlockType, PaverBlockTypeForm, ValidatedEstimate};
use crate::pipeline::EstimatePipeline;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("paver block type {0} does not exist")]
    UnknownPaverBlockType(i64),
}

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn count_users(&self) -> Result<i64, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    // Paver block types, ordered by name
    async fn list_paver_block_types(&self) -> Result<Vec<PaverBlockType>, StoreError>;
    async fn get_paver_block_type(&self, id: i64) -> Result<Option<PaverBlockType>, StoreError>;
    async fn create_paver_block_type(
        &self,
        form: &PaverBlockTypeForm,
    ) -> Result<PaverBlockType, StoreError>;
    async fn update_paver_block_type(
        &self,
        id: i64,
        form: &PaverBlockTypeForm,
    ) -> Result<Option<PaverBlockType>, StoreError>;
    /// Number of estimates (of any owner) that reference the type.
    async fn count_estimates_using(&self, paver_block_type_id: i64) -> Result<i64, StoreError>;
    /// Deletes the type and every estimate referencing it.
    async fn delete_paver_block_type(&self, id: i64) -> Result<bool, StoreError>;

    // Estimates, scoped to their owner
    /// Newest first.
    async fn list_estimates(&self, owner: Uuid) -> Result<Vec<Estimate>, StoreError>;
    async fn get_estimate(&self, owner: Uuid, id: i64) -> Result<Option<Estimate>, StoreError>;
    async fn create_estimate(
        &self,
        owner: Uuid,
        estimate: &ValidatedEstimate,
    ) -> Result<Estimate, StoreError>;
    async fn update_estimate(
        &self,
        owner: Uuid,
        id: i64,
        estimate: &ValidatedEstimate,
    ) -> Result<Option<Estimate>, StoreError>;
    async fn delete_estimate(&self, owner: Uuid, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline: Arc<EstimatePipeline>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, pipeline: EstimatePipeline) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Connect to Postgres when `DATABASE_URL` is configured, otherwise fall
    /// back to the in-memory store.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                log::info!("Connected to Postgres and applied migrations");
                Arc::new(store)
            }
            None => {
                log::warn!("DATABASE_URL not set, using in-memory store. Data is lost on restart!");
                Arc::new(MemoryStore::new())
            }
        };

        let pipeline = EstimatePipeline::from_config(config);
        if !pipeline.template_path().exists() {
            log::warn!(
                "Estimate template {} does not exist; document generation will fail until it is deployed",
                pipeline.template_path().display()
            );
        }
        log::info!(
            "PDF conversion backends: {:?}",
            pipeline.backend_names()
        );

        Ok(Self::new(store, pipeline))
    }
}
