//! In-memory store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::auth::model::User;
use crate::estimate::model::{Estimate, PaverBlockType, PaverBlockTypeForm, ValidatedEstimate};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    paver_block_types: Vec<PaverBlockType>,
    estimates: Vec<Estimate>,
    next_paver_block_id: i64,
    next_estimate_id: i64,
}

/// Store backed by process memory. Mirrors the Postgres schema rules:
/// unique usernames, estimates must reference an existing paver block type,
/// and deleting a type cascades to its estimates.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.tables.read().users.len() as i64)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables
            .read()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.tables.write();
        if tables.users.iter().any(|user| user.username == username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn list_paver_block_types(&self) -> Result<Vec<PaverBlockType>, StoreError> {
        let mut types = self.tables.read().paver_block_types.clone();
        types.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(types)
    }

    async fn get_paver_block_type(&self, id: i64) -> Result<Option<PaverBlockType>, StoreError> {
        Ok(self
            .tables
            .read()
            .paver_block_types
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn create_paver_block_type(
        &self,
        form: &PaverBlockTypeForm,
    ) -> Result<PaverBlockType, StoreError> {
        let mut tables = self.tables.write();
        tables.next_paver_block_id += 1;
        let now = Utc::now();
        let paver_block_type = PaverBlockType {
            id: tables.next_paver_block_id,
            name: form.name.trim().to_string(),
            description: form.description.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.paver_block_types.push(paver_block_type.clone());
        Ok(paver_block_type)
    }

    async fn update_paver_block_type(
        &self,
        id: i64,
        form: &PaverBlockTypeForm,
    ) -> Result<Option<PaverBlockType>, StoreError> {
        let mut tables = self.tables.write();
        let Some(existing) = tables.paver_block_types.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        existing.name = form.name.trim().to_string();
        existing.description = form.description.trim().to_string();
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn count_estimates_using(&self, paver_block_type_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .tables
            .read()
            .estimates
            .iter()
            .filter(|e| e.paver_block_type_id == paver_block_type_id)
            .count() as i64)
    }

    async fn delete_paver_block_type(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.paver_block_types.len();
        tables.paver_block_types.retain(|t| t.id != id);
        if tables.paver_block_types.len() == before {
            return Ok(false);
        }
        tables.estimates.retain(|e| e.paver_block_type_id != id);
        Ok(true)
    }

    async fn list_estimates(&self, owner: Uuid) -> Result<Vec<Estimate>, StoreError> {
        let mut estimates: Vec<Estimate> = self
            .tables
            .read()
            .estimates
            .iter()
            .filter(|e| e.created_by == owner)
            .cloned()
            .collect();
        estimates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(estimates)
    }

    async fn get_estimate(&self, owner: Uuid, id: i64) -> Result<Option<Estimate>, StoreError> {
        Ok(self
            .tables
            .read()
            .estimates
            .iter()
            .find(|e| e.id == id && e.created_by == owner)
            .cloned())
    }

    async fn create_estimate(
        &self,
        owner: Uuid,
        estimate: &ValidatedEstimate,
    ) -> Result<Estimate, StoreError> {
        let mut tables = self.tables.write();
        let type_id = estimate.paver_block_type_id();
        if !tables.paver_block_types.iter().any(|t| t.id == type_id) {
            return Err(StoreError::UnknownPaverBlockType(type_id));
        }
        tables.next_estimate_id += 1;
        let now = Utc::now();
        let record = estimate.to_estimate(tables.next_estimate_id, owner, now, now);
        tables.estimates.push(record.clone());
        Ok(record)
    }

    async fn update_estimate(
        &self,
        owner: Uuid,
        id: i64,
        estimate: &ValidatedEstimate,
    ) -> Result<Option<Estimate>, StoreError> {
        let mut tables = self.tables.write();
        let type_id = estimate.paver_block_type_id();
        let type_exists = tables.paver_block_types.iter().any(|t| t.id == type_id);

        let Some(existing) = tables
            .estimates
            .iter_mut()
            .find(|e| e.id == id && e.created_by == owner)
        else {
            return Ok(None);
        };
        if !type_exists {
            return Err(StoreError::UnknownPaverBlockType(type_id));
        }

        *existing = estimate.to_estimate(id, owner, existing.created_at, Utc::now());
        Ok(Some(existing.clone()))
    }

    async fn delete_estimate(&self, owner: Uuid, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.estimates.len();
        tables
            .estimates
            .retain(|e| !(e.id == id && e.created_by == owner));
        Ok(tables.estimates.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::model::EstimateForm;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn block(name: &str) -> PaverBlockTypeForm {
        PaverBlockTypeForm {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn estimate(type_id: i64, price: &str) -> ValidatedEstimate {
        EstimateForm {
            party_name: "Acme Co".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            paver_block_type: type_id,
            price: Decimal::from_str(price).unwrap(),
            gst_percentage: Decimal::from(18),
            transportation_charge: Decimal::from(200),
            loading_unloading_cost: Decimal::from(100),
            notes: String::new(),
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_estimates_are_owner_scoped() {
        let store = MemoryStore::new();
        let zigzag = store.create_paver_block_type(&block("Zig-Zag")).await.unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let created = store
            .create_estimate(alice, &estimate(zigzag.id, "1000"))
            .await
            .unwrap();
        assert_eq!(created.total_amount, Decimal::from_str("1480.00").unwrap());

        assert!(store.get_estimate(alice, created.id).await.unwrap().is_some());
        assert!(store.get_estimate(bob, created.id).await.unwrap().is_none());
        assert!(store.list_estimates(bob).await.unwrap().is_empty());
        assert!(!store.delete_estimate(bob, created.id).await.unwrap());
        assert!(store
            .update_estimate(bob, created.id, &estimate(zigzag.id, "1"))
            .await
            .unwrap()
            .is_none());
        assert!(store.delete_estimate(alice, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_recomputes_derived_amounts() {
        let store = MemoryStore::new();
        let plain = store.create_paver_block_type(&block("Plain")).await.unwrap();
        let owner = Uuid::new_v4();
        let created = store
            .create_estimate(owner, &estimate(plain.id, "1000"))
            .await
            .unwrap();

        let updated = store
            .update_estimate(owner, created.id, &estimate(plain.id, "2000"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.gst_amount, Decimal::from_str("360.00").unwrap());
        assert_eq!(updated.total_amount, Decimal::from_str("2660.00").unwrap());
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_unknown_paver_block_type_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_estimate(Uuid::new_v4(), &estimate(99, "1000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPaverBlockType(99)));
    }

    #[tokio::test]
    async fn test_deleting_type_cascades_to_estimates() {
        let store = MemoryStore::new();
        let doomed = store.create_paver_block_type(&block("Doomed")).await.unwrap();
        let kept = store.create_paver_block_type(&block("Kept")).await.unwrap();
        let owner = Uuid::new_v4();
        store.create_estimate(owner, &estimate(doomed.id, "1")).await.unwrap();
        store.create_estimate(Uuid::new_v4(), &estimate(doomed.id, "2")).await.unwrap();
        store.create_estimate(owner, &estimate(kept.id, "3")).await.unwrap();

        assert_eq!(store.count_estimates_using(doomed.id).await.unwrap(), 2);
        assert!(store.delete_paver_block_type(doomed.id).await.unwrap());
        assert!(!store.delete_paver_block_type(doomed.id).await.unwrap());

        let remaining = store.list_estimates(owner).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].paver_block_type_id, kept.id);
    }

    #[tokio::test]
    async fn test_listings_are_ordered() {
        let store = MemoryStore::new();
        store.create_paver_block_type(&block("Zig-Zag")).await.unwrap();
        let plain = store.create_paver_block_type(&block("Plain")).await.unwrap();
        let names: Vec<String> = store
            .list_paver_block_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Plain", "Zig-Zag"]);

        let owner = Uuid::new_v4();
        let first = store.create_estimate(owner, &estimate(plain.id, "1")).await.unwrap();
        let second = store.create_estimate(owner, &estimate(plain.id, "2")).await.unwrap();
        let ids: Vec<i64> = store
            .list_estimates(owner)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let store = MemoryStore::new();
        store.create_user("estimator", "hash").await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
        assert!(matches!(
            store.create_user("estimator", "other").await,
            Err(StoreError::DuplicateUsername(_))
        ));
        assert!(store
            .find_user_by_username("estimator")
            .await
            .unwrap()
            .is_some());
    }
}
