pub mod drain;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;

pub const PREDICT_PATH: &str = "/predict";
pub const SAMPLE_TEXT: &str = "OpenAI is located in San Francisco.";
pub const SAMPLE_THRESHOLD: f64 = 0.8;

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

#[inline]
pub fn json_body<T: serde::Serialize>(value: &T) -> anyhow::Result<Full<Bytes>> {
    let raw = serde_json::to_vec(value).context("Failed to serialize json body")?;
    Ok(byte_body(raw))
}

/// Body of a `POST /predict` call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictRequest {
    pub texts: Vec<String>,
    pub threshold: f64,
}

impl PredictRequest {
    #[must_use]
    pub fn new(texts: Vec<String>, threshold: f64) -> Self {
        Self { texts, threshold }
    }

    /// The fixed smoke-test payload.
    #[must_use]
    pub fn sample() -> Self {
        Self::new(vec![SAMPLE_TEXT.to_string()], SAMPLE_THRESHOLD)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.texts.is_empty() {
            anyhow::bail!("Predict request needs at least one text");
        }
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            anyhow::bail!(
                "Predict threshold must be within [0, 1], got {}",
                self.threshold
            );
        }
        Ok(())
    }
}

impl Default for PredictRequest {
    fn default() -> Self {
        Self::sample()
    }
}

const TALLY_KEEP_BODIES: usize = 1024;

/// Counts predict calls received by the mock server and keeps the most recent bodies.
#[derive(Clone, Default)]
pub struct PredictTally {
    count: Arc<AtomicUsize>,
    bodies: Arc<Mutex<VecDeque<Bytes>>>,
}

impl PredictTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, body: Bytes) -> usize {
        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        let mut bodies = self.bodies.lock().unwrap_or_else(PoisonError::into_inner);
        if bodies.len() == TALLY_KEEP_BODIES {
            bodies.pop_front();
        }
        bodies.push_back(body);
        prev + 1
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Oldest first, at most the last 1024.
    #[must_use]
    pub fn bodies(&self) -> Vec<Bytes> {
        let bodies = self.bodies.lock().unwrap_or_else(PoisonError::into_inner);
        bodies.iter().cloned().collect()
    }
}
