//! Input parameters of a simulation.

use serde::{Deserialize, Serialize};

/// Validated input configuration, passed through to the runner untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationParameters(serde_json::Value);

impl SimulationParameters {
    /// Wrap a JSON document.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

}

impl From<serde_json::Value> for SimulationParameters {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self(serde_json::json!({}))
    }
}
