//! Batch conversion and a content-addressed result cache.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::convert::{ConvertOptions, TemplateConverter};
use crate::error::Result;
use crate::metadata::ComponentMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    pub source: String,
    pub metadata: ComponentMetadata,
}

/// Converts every job in parallel. Results keep the order of `jobs`.
pub fn convert_all(jobs: &[ConversionJob], options: &ConvertOptions) -> Vec<Result<String>> {
    tracing::debug!(jobs = jobs.len(), "batch conversion");
    jobs.par_iter()
        .map(|job| TemplateConverter::with_options(&job.metadata, options.clone()).convert(&job.source))
        .collect()
}

/// Successful outputs keyed by the SHA-256 of source, metadata and options.
/// Failures are never stored.
#[derive(Debug, Default)]
pub struct ConversionCache {
    entries: Mutex<HashMap<String, String>>,
}

impl ConversionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, metadata: &ComponentMetadata, options: &ConvertOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_string(metadata).unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_string(options).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get_or_convert(
        &self,
        source: &str,
        metadata: &ComponentMetadata,
        options: &ConvertOptions,
    ) -> Result<String> {
        let key = Self::compute_hash(source, metadata, options);
        if let Some(hit) = self.lock().get(&key) {
            tracing::trace!(component = %metadata.name, "conversion cache hit");
            return Ok(hit.clone());
        }

        let output = TemplateConverter::with_options(metadata, options.clone()).convert(source)?;
        self.lock().insert(key, output.clone());
        Ok(output)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map only ever holds complete entries.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
