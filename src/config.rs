use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithm::relay::RetryPolicy;

/// Settings of the node's event graph. Every field has a default, so partial
/// (or empty) JSON documents are accepted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Drop incoming events without a valid creator signature
    pub verify_signatures: bool,
    /// Events waiting for missing parents, at most
    pub max_orphans: usize,
    /// Upper bound on other parents of an event, `None` for unbounded
    pub max_other_parents: Option<usize>,
    pub relay_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            max_orphans: 1024,
            max_other_parents: None,
            relay_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
