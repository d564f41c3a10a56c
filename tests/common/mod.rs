#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use handprint::{FingerFactory, HandprintConfig, TableFingerprint};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Deterministic pseudo-random bytes.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Route library logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("handprint=debug")
        .with_test_writer()
        .try_init();
}

/// Table-engine factory with the default configuration.
pub fn default_factory() -> Arc<FingerFactory<TableFingerprint>> {
    factory_with(&HandprintConfig::default())
}

pub fn factory_with(config: &HandprintConfig) -> Arc<FingerFactory<TableFingerprint>> {
    Arc::new(FingerFactory::new(config).expect("valid configuration"))
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("write test file");
    path
}
