//! Integration test: config load, train to threshold, authenticate, reload from disk.

use keystroke_auth::{
    config::AuthConfig,
    error::AuthError,
    events::{KeystrokeEvent as K, KeystrokeRequest},
    features::TimingExtractor,
    service::AuthService,
};
use std::path::Path;
use std::sync::Arc;

/// "hello" typed with small per-sample timing drift.
fn hello(user: &str, drift: i64) -> KeystrokeRequest {
    let mut events = Vec::new();
    let mut t = 0;
    for (i, key) in ["h", "e", "l", "l", "o"].iter().enumerate() {
        let hold = 90 + (drift * (i as i64 + 1)) % 17;
        events.push(K::down(*key, t));
        events.push(K::up(*key, t + hold));
        t += 140 + (drift * 3 + i as i64 * 5) % 23;
    }
    KeystrokeRequest::new(user, events)
}

fn config_in(dir: &Path) -> AuthConfig {
    let mut c = AuthConfig::default();
    c.data_dir = dir.to_path_buf();
    c
}

#[test]
fn config_load_default() {
    let c = AuthConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.min_samples, 5);
    assert_eq!(c.training.contamination, 0.1);
    assert!(c.cache.enabled);
}

#[test]
fn two_key_scenario_features() {
    let events = vec![K::down("a", 0), K::up("a", 100), K::down("b", 150), K::up("b", 260)];
    let fv = TimingExtractor::default().extract(&events);
    assert_eq!(fv.as_slice(), &[0.100, 0.150, 0.050, 0.110]);
}

#[test]
fn fifth_sample_trains_and_unlocks_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let service = AuthService::open(config_in(dir.path()), b"test-secret").unwrap();

    for drift in 0..4 {
        let r = service.train(&hello("alice", drift)).unwrap();
        assert!(!r.trained);
        assert_eq!(r.sample_count, drift as usize + 1);
    }
    assert!(matches!(
        service.authenticate(&hello("alice", 9)),
        Err(AuthError::ModelNotFound { .. })
    ));

    let r = service.train(&hello("alice", 4)).unwrap();
    assert!(r.trained);
    assert_eq!(r.sample_count, 5);

    let auth = service.authenticate(&hello("alice", 2)).unwrap();
    assert_eq!(auth.user_id, "alice");
    assert!(auth.score.is_finite());
}

#[test]
fn never_trained_user_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = AuthService::open(config_in(dir.path()), b"test-secret").unwrap();
    let err = service.authenticate(&hello("bob", 0)).unwrap_err();
    assert_eq!(err.code(), "model_not_found");
    assert!(!err.is_retryable());
}

#[test]
fn reloaded_model_scores_bit_identically() {
    let dir = tempfile::tempdir().unwrap();
    let probe = hello("carol", 11);
    let before = {
        let service = AuthService::open(config_in(dir.path()), b"test-secret").unwrap();
        for drift in 0..6 {
            service.train(&hello("carol", drift)).unwrap();
        }
        service.authenticate(&probe).unwrap()
    };

    let mut cold = config_in(dir.path());
    cold.cache.enabled = false;
    let service = AuthService::open(cold, b"test-secret").unwrap();
    let after = service.authenticate(&probe).unwrap();
    assert_eq!(before.genuine, after.genuine);
    assert_eq!(before.score.to_bits(), after.score.to_bits());

    let info = service.user_info("carol").unwrap();
    assert_eq!(info.training_samples, 6);
    assert!(info.has_trained_model);
}

#[test]
fn short_and_long_samples_are_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let service = AuthService::open(config_in(dir.path()), b"test-secret").unwrap();
    for drift in 0..5 {
        service.train(&hello("dave", drift)).unwrap();
    }
    let short = KeystrokeRequest::new(
        "dave",
        vec![K::down("h", 0), K::up("h", 95), K::down("i", 150), K::up("i", 240)],
    );
    assert!(service.authenticate(&short).is_ok());

    let mut long = hello("dave", 1);
    let mut t = 2000;
    for key in ["w", "o", "r", "l", "d"] {
        long.events.push(K::down(key, t));
        long.events.push(K::up(key, t + 80));
        t += 130;
    }
    assert!(service.authenticate(&long).is_ok());
}

#[test]
fn concurrent_training_keeps_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(AuthService::open(config_in(dir.path()), b"test-secret").unwrap());
    let handles: Vec<_> = (0..8)
        .map(|drift| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.train(&hello("erin", drift)).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let info = service.user_info("erin").unwrap();
    assert_eq!(info.training_samples, 8);
    assert!(info.has_trained_model);
    assert!(service.authenticate(&hello("erin", 3)).is_ok());
}

#[test]
fn wrong_secret_cannot_read_corpus() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = AuthService::open(config_in(dir.path()), b"right").unwrap();
        service.train(&hello("frank", 0)).unwrap();
    }
    let service = AuthService::open(config_in(dir.path()), b"wrong").unwrap();
    let err = service.train(&hello("frank", 1)).unwrap_err();
    assert!(err.is_retryable());
}
