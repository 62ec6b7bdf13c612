/// Profile storage: business and courier records the chat list resolves
use crate::error::{ChatError, Result};
use crate::models::{BusinessProfile, CourierProfile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub struct ProfileStore {
    businesses: sled::Tree,
    couriers: sled::Tree,
}

fn put<T: Serialize>(tree: &sled::Tree, id: Uuid, record: &T) -> Result<()> {
    let val = serde_json::to_vec(record)?;
    tree.insert(id.as_bytes(), val)
        .map_err(|e| ChatError::storage("save profile", e))?;
    Ok(())
}

/// One lookup per id; unknown ids are skipped, duplicates resolved once.
fn get_many<T: DeserializeOwned>(tree: &sled::Tree, ids: &[Uuid]) -> Result<Vec<T>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if !seen.insert(*id) {
            continue;
        }
        if let Some(val) = tree
            .get(id.as_bytes())
            .map_err(|e| ChatError::storage("get profile", e))?
        {
            out.push(serde_json::from_slice(&val)?);
        }
    }
    Ok(out)
}

impl ProfileStore {
    pub fn new(db: &sled::Db) -> Result<Self> {
        let businesses = db
            .open_tree("businesses")
            .map_err(|e| ChatError::storage("open businesses tree", e))?;
        let couriers = db
            .open_tree("couriers")
            .map_err(|e| ChatError::storage("open couriers tree", e))?;
        Ok(Self {
            businesses,
            couriers,
        })
    }

    pub fn upsert_business(&self, p: &BusinessProfile) -> Result<()> {
        put(&self.businesses, p.user_id, p)
    }

    pub fn upsert_courier(&self, p: &CourierProfile) -> Result<()> {
        put(&self.couriers, p.user_id, p)
    }

    pub fn businesses(&self, ids: &[Uuid]) -> Result<Vec<BusinessProfile>> {
        get_many(&self.businesses, ids)
    }

    pub fn couriers(&self, ids: &[Uuid]) -> Result<Vec<CourierProfile>> {
        get_many(&self.couriers, ids)
    }
}

impl Clone for ProfileStore {
    fn clone(&self) -> Self {
        Self {
            businesses: self.businesses.clone(),
            couriers: self.couriers.clone(),
        }
    }
}
