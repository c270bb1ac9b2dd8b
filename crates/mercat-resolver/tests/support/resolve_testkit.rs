use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mercat_resolver::{EmbeddingProvider, MerchantResolver, ProviderError};
use tempfile::{Builder, TempDir};

pub const DIMENSIONS: usize = 1536;

pub fn temp_home_in_tmp(prefix: &str) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = Builder::new().prefix(prefix).tempdir_in("/tmp")?;
    let home = dir.path().join("resolver-home");
    fs::create_dir_all(&home)?;
    Ok((dir, home))
}

/// Programmable in-memory embedding provider.
///
/// Vectors are registered per normalized text; unregistered texts get a
/// deterministic pseudo-vector derived from their bytes so unrelated texts
/// stay far apart. Every batch is recorded for call-count assertions, and
/// the provider can be switched into a failing mode to exercise the
/// degrade paths.
pub struct FakeProvider {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    calls: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            vectors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    pub fn register(&self, text: &str, vector: Vec<f32>) {
        if let Ok(mut vectors) = self.vectors.lock() {
            vectors.insert(text.to_uppercase(), vector);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn requested_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Ok(vectors) = self.vectors.lock()
            && let Some(vector) = vectors.get(&text.to_uppercase())
        {
            return vector.clone();
        }
        pseudo_vector(text)
    }
}

impl EmbeddingProvider for FakeProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("simulated quota failure".to_string()));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(texts.to_vec());
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// A unit vector along one axis; orthogonal axes give cosine 0.0 between
/// unrelated merchants and 1.0 for equal registrations.
pub fn axis_vector(axis: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];
    vector[axis % DIMENSIONS] = 1.0;
    vector
}

/// A vector at a known cosine angle to the given axis.
pub fn angled_vector(axis: usize, cosine: f32) -> Vec<f32> {
    let other = (axis + 1) % DIMENSIONS;
    let mut vector = vec![0.0f32; DIMENSIONS];
    vector[axis % DIMENSIONS] = cosine;
    vector[other] = (1.0 - cosine * cosine).max(0.0).sqrt();
    vector
}

fn pseudo_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];
    let mut accumulator: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.to_uppercase().into_bytes() {
        accumulator ^= u64::from(byte);
        accumulator = accumulator.wrapping_mul(0x0000_0100_0000_01b3);
        let slot = (accumulator % DIMENSIONS as u64) as usize;
        vector[slot] += 1.0;
    }
    vector
}

pub fn open_resolver(home: &std::path::Path, provider: Arc<FakeProvider>) -> MerchantResolver {
    match MerchantResolver::open_at(home, provider) {
        Ok(resolver) => resolver,
        Err(error) => panic!("resolver failed to open: {error}"),
    }
}
