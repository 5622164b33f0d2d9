//! Configuration for a linking run.

use crate::DisasterResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings that control how records are linked.
///
/// This is loaded from a JSON file like `{"days_leniency": 3, "debug_messages_on": false}`.
/// Missing keys take their default values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Number of days two disasters may be apart and still be considered overlapping in time.
    pub days_leniency: u32,
    /// Turn on debug level logging for the run.
    pub debug_messages_on: bool,
}

impl LinkConfig {
    /// Load the configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> DisasterResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse the configuration from a JSON string.
    pub fn from_json_str(text: &str) -> DisasterResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
