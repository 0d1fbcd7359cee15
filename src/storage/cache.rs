//! In-memory model cache in front of [`ModelStore`]. Entries live for the life
//! of the cache and are replaced only when a new model is saved for the user.

use super::ModelStore;
use crate::error::StoreError;
use crate::model::{AnomalyModel, TrainedModel};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

pub struct ModelCache<M> {
    store: ModelStore<M>,
    /// None when caching is disabled
    entries: Option<RwLock<HashMap<String, Arc<TrainedModel<M>>>>>,
}

impl<M: AnomalyModel> ModelCache<M> {
    pub fn new(store: ModelStore<M>, enabled: bool) -> Self {
        Self {
            store,
            entries: enabled.then(|| RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map(|e| e.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load(&self, user_id: &str) -> Result<Option<Arc<TrainedModel<M>>>, StoreError> {
        let Some(entries) = &self.entries else {
            return Ok(self.store.load(user_id)?.map(Arc::new));
        };
        if let Some(hit) = entries.read().unwrap_or_else(PoisonError::into_inner).get(user_id) {
            debug!(user_id, "model cache hit");
            return Ok(Some(Arc::clone(hit)));
        }
        let Some(loaded) = self.store.load(user_id)? else {
            return Ok(None);
        };
        // A save racing with this load may already have cached a newer model.
        let mut map = entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(user_id.to_string()).or_insert_with(|| Arc::new(loaded));
        Ok(Some(Arc::clone(entry)))
    }

    /// Persist, then swap the cached entry for the user.
    pub fn save(&self, trained: TrainedModel<M>) -> Result<Arc<TrainedModel<M>>, StoreError> {
        let saved = Arc::new(self.store.save(trained)?);
        if let Some(entries) = &self.entries {
            entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(saved.metadata.user_id.clone(), Arc::clone(&saved));
        }
        Ok(saved)
    }
}
