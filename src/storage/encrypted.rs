//! SQLite-backed store with AES-GCM encryption of every biometric payload column.
//! Key derived from a deployment secret (`KEYSTROKE_AUTH_SECRET`).

use crate::error::StoreError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS samples (
        user_id TEXT PRIMARY KEY,
        corpus_enc TEXT NOT NULL,
        sample_count INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS models (
        user_id TEXT PRIMARY KEY,
        model_id TEXT NOT NULL,
        blob_enc TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS model_meta (
        user_id TEXT PRIMARY KEY,
        model_id TEXT NOT NULL,
        meta_enc TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
"#;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

pub struct SecureStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SecureStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?, secret)
    }

    /// Non-durable store for tests and benches.
    pub fn open_in_memory(secret: &[u8]) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, secret)
    }

    fn init(conn: Connection, secret: &[u8]) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encrypt with a fresh nonce; output is base64(nonce || ciphertext).
    pub(crate) fn seal(&self, plaintext: &[u8]) -> Result<String, StoreError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StoreError::Crypto(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt((&nonce).into(), plaintext)
            .map_err(|_| StoreError::Crypto("encryption failed".into()))?;
        let mut out = nonce.to_vec();
        out.extend(ciphertext);
        Ok(BASE64.encode(&out))
    }

    pub(crate) fn unseal(&self, encoded: &str) -> Result<Vec<u8>, StoreError> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| StoreError::Crypto(format!("payload not base64: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(StoreError::Crypto("payload too short".into()));
        }
        let (nonce, ct) = raw.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StoreError::Crypto(e.to_string()))?;
        cipher
            .decrypt(nonce.into(), ct)
            .map_err(|_| StoreError::Crypto("authentication tag mismatch".into()))
    }
}
