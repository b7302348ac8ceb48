use crate::application::retry::RetryPolicy;
use crate::domain::residence::{ResidenceFilter, ResidencePolicy};
use crate::error::{FeeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the fee engine, loadable from a JSON file.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub residence_policy: ResidencePolicy,
    /// Classify unscoped catalog items by name tokens.
    pub infer_unspecified_scope: bool,
    pub retry: RetryPolicy,
    /// How many keyed submissions the gateway remembers.
    pub idempotency_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            residence_policy: ResidencePolicy::Inclusive,
            infer_unspecified_scope: false,
            retry: RetryPolicy::default(),
            idempotency_window: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| FeeError::Config(e.to_string()))
    }

    pub fn residence_filter(&self) -> ResidenceFilter {
        ResidenceFilter::new(self.residence_policy, self.infer_unspecified_scope)
    }
}
