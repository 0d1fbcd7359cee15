//! Durable model blobs and their metadata, written together in one transaction.
//!
//! The two rows are linked by `model_id` and by the SHA-256 of the blob. Any
//! half-written, mismatched or undecryptable pair reads back as "no model".

use super::SecureStore;
use crate::error::StoreError;
use crate::model::{AnomalyModel, ModelMetadata, TrainedModel};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

fn blob_digest(blob: &[u8]) -> String {
    format!("{:x}", Sha256::digest(blob))
}

pub struct ModelStore<M> {
    store: Arc<SecureStore>,
    _model: PhantomData<fn() -> M>,
}

impl<M: AnomalyModel> ModelStore<M> {
    pub fn new(store: Arc<SecureStore>) -> Self {
        Self {
            store,
            _model: PhantomData,
        }
    }

    /// Persist model and metadata atomically, replacing any previous pair.
    /// The returned model carries the blob digest recorded in its metadata.
    pub fn save(&self, mut trained: TrainedModel<M>) -> Result<TrainedModel<M>, StoreError> {
        let blob = serde_json::to_vec(&trained.model)?;
        trained.metadata.blob_sha256 = blob_digest(&blob);
        let meta = &trained.metadata;
        let blob_enc = self.store.seal(&blob)?;
        let meta_enc = self.store.seal(&serde_json::to_vec(meta)?)?;
        let model_id = meta.model_id.to_string();

        let mut conn = self.store.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO models (user_id, model_id, blob_enc) VALUES (?1, ?2, ?3)",
            params![meta.user_id, model_id, blob_enc],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO model_meta (user_id, model_id, meta_enc, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![meta.user_id, model_id, meta_enc, meta.created_at.timestamp_millis()],
        )?;
        tx.commit()?;
        info!(
            user_id = %meta.user_id,
            expected_vector_length = meta.expected_vector_length,
            "saved model"
        );
        Ok(trained)
    }

    /// Load the user's model; `Ok(None)` when absent or unusable.
    pub fn load(&self, user_id: &str) -> Result<Option<TrainedModel<M>>, StoreError> {
        let (model_row, meta_row) = {
            let conn = self.store.conn();
            let model_row: Option<(String, String)> = conn
                .query_row(
                    "SELECT model_id, blob_enc FROM models WHERE user_id = ?1",
                    params![user_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let meta_row: Option<(String, String)> = conn
                .query_row(
                    "SELECT model_id, meta_enc FROM model_meta WHERE user_id = ?1",
                    params![user_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            (model_row, meta_row)
        };

        let ((model_id, blob_enc), (meta_model_id, meta_enc)) = match (model_row, meta_row) {
            (Some(m), Some(t)) => (m, t),
            (None, None) => return Ok(None),
            _ => {
                warn!(user_id, "model and metadata records out of step; treating as untrained");
                return Ok(None);
            }
        };
        if model_id != meta_model_id {
            warn!(user_id, "model and metadata ids differ; treating as untrained");
            return Ok(None);
        }
        match self.decode(user_id, &model_id, &blob_enc, &meta_enc) {
            Ok(trained) => Ok(trained),
            Err(e) => {
                warn!(user_id, error = %e, "model unreadable; treating as untrained");
                Ok(None)
            }
        }
    }

    fn decode(
        &self,
        user_id: &str,
        model_id: &str,
        blob_enc: &str,
        meta_enc: &str,
    ) -> Result<Option<TrainedModel<M>>, StoreError> {
        let metadata: ModelMetadata = serde_json::from_slice(&self.store.unseal(meta_enc)?)?;
        let blob = self.store.unseal(blob_enc)?;
        if metadata.user_id != user_id
            || metadata.model_id.to_string() != model_id
            || metadata.blob_sha256 != blob_digest(&blob)
        {
            warn!(user_id, "metadata does not describe stored blob");
            return Ok(None);
        }
        let model: M = serde_json::from_slice(&blob)?;
        if model.n_features() != metadata.expected_vector_length {
            warn!(user_id, "model width disagrees with metadata");
            return Ok(None);
        }
        Ok(Some(TrainedModel { model, metadata }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IsolationForest, IsolationForestParams};
    use chrono::Utc;
    use ndarray::{arr1, Array2};
    use uuid::Uuid;

    fn trained(user: &str) -> TrainedModel<IsolationForest> {
        let data = Array2::from_shape_fn((6, 3), |(r, c)| 0.1 + 0.01 * (r * 3 + c) as f64);
        let model = IsolationForest::fit(data.view(), &IsolationForestParams::default()).unwrap();
        TrainedModel {
            model,
            metadata: ModelMetadata {
                model_id: Uuid::new_v4(),
                user_id: user.to_string(),
                model_type: "IsolationForest".into(),
                version: "1.0".into(),
                feature_extraction_method: "keystroke_dynamics".into(),
                expected_vector_length: 3,
                sample_count: 6,
                training_parameters: serde_json::json!({}),
                created_at: Utc::now(),
                blob_sha256: String::new(),
            },
        }
    }

    fn store() -> ModelStore<IsolationForest> {
        ModelStore::new(Arc::new(SecureStore::open_in_memory(b"test").unwrap()))
    }

    #[test]
    fn missing_model_is_none() {
        assert!(store().load("nobody").unwrap().is_none());
    }

    #[test]
    fn save_then_load_scores_identically() {
        let s = store();
        let saved = s.save(trained("u")).unwrap();
        assert_eq!(saved.metadata.blob_sha256.len(), 64);
        let loaded = s.load("u").unwrap().unwrap();
        assert_eq!(loaded.metadata, saved.metadata);
        let probe = arr1(&[0.15, 0.2, 0.12]);
        assert_eq!(
            saved.model.classify(probe.view()).unwrap(),
            loaded.model.classify(probe.view()).unwrap()
        );
    }

    #[test]
    fn orphaned_metadata_reads_as_untrained() {
        let s = store();
        s.save(trained("u")).unwrap();
        s.store.conn().execute("DELETE FROM models WHERE user_id = 'u'", []).unwrap();
        assert!(s.load("u").unwrap().is_none());
    }

    #[test]
    fn mismatched_pair_reads_as_untrained() {
        let s = store();
        s.save(trained("u")).unwrap();
        s.store
            .conn()
            .execute("UPDATE models SET model_id = 'other' WHERE user_id = 'u'", [])
            .unwrap();
        assert!(s.load("u").unwrap().is_none());
    }

    #[test]
    fn corrupt_blob_reads_as_untrained() {
        let s = store();
        s.save(trained("u")).unwrap();
        s.store
            .conn()
            .execute("UPDATE models SET blob_enc = 'AAAA' WHERE user_id = 'u'", [])
            .unwrap();
        assert!(s.load("u").unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_model() {
        let s = store();
        let first = s.save(trained("u")).unwrap();
        let second = s.save(trained("u")).unwrap();
        let loaded = s.load("u").unwrap().unwrap();
        assert_ne!(first.metadata.model_id, loaded.metadata.model_id);
        assert_eq!(second.metadata.model_id, loaded.metadata.model_id);
    }
}
