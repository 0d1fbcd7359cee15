//! Per-user training corpus: an append-only list of feature vectors, persisted
//! whole on every append.

use super::{SecureStore, UserLocks};
use crate::error::StoreError;
use crate::features::FeatureVector;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use tracing::info;

pub struct SampleStore {
    store: Arc<SecureStore>,
    locks: UserLocks,
}

impl SampleStore {
    pub fn new(store: Arc<SecureStore>) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
        }
    }

    /// Full corpus for `user_id`; unknown users have an empty corpus.
    pub fn load_all(&self, user_id: &str) -> Result<Vec<FeatureVector>, StoreError> {
        let enc: Option<String> = self
            .store
            .conn()
            .query_row(
                "SELECT corpus_enc FROM samples WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match enc {
            Some(enc) => Ok(serde_json::from_slice(&self.store.unseal(&enc)?)?),
            None => Ok(Vec::new()),
        }
    }

    /// Sample count without decrypting the corpus.
    pub fn count(&self, user_id: &str) -> Result<usize, StoreError> {
        let n: Option<i64> = self
            .store
            .conn()
            .query_row(
                "SELECT sample_count FROM samples WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(n.unwrap_or(0) as usize)
    }

    /// Reload, append, persist the whole corpus. Returns the corpus as stored.
    pub fn append(&self, user_id: &str, vector: FeatureVector) -> Result<Vec<FeatureVector>, StoreError> {
        self.locks.with_user(user_id, || -> Result<_, StoreError> {
            let mut corpus = self.load_all(user_id)?;
            corpus.push(vector);
            let enc = self.store.seal(&serde_json::to_vec(&corpus)?)?;
            self.store.conn().execute(
                "INSERT OR REPLACE INTO samples (user_id, corpus_enc, sample_count, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, enc, corpus.len() as i64, Utc::now().timestamp_millis()],
            )?;
            info!(user_id, samples = corpus.len(), "saved feature samples");
            Ok(corpus)
        })
    }
}
