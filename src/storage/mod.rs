//! Encrypted local storage for feature corpora, models, and model metadata.

mod cache;
mod encrypted;
mod locks;
mod models;
mod samples;

pub use cache::ModelCache;
pub use encrypted::SecureStore;
pub use locks::UserLocks;
pub use models::ModelStore;
pub use samples::SampleStore;
