//! Grid manifest written as `config.json` in the grid directory.
//!
//! The manifest lets a frontend rebuild the grid layout and recompute every
//! cell's combination id without re-running the grid.

use serde::{Deserialize, Serialize};

use crate::axis::{Axis, AxisDescriptor};
use crate::error::CoreError;
use crate::request::GenerationRequest;

/// File name of the manifest inside the grid directory.
pub const MANIFEST_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridManifest {
    pub name: String,
    /// Base request parameters after normalisation.
    pub params: serde_json::Value,
    pub axis: Vec<AxisDescriptor>,
}

impl GridManifest {
    pub fn new(name: &str, base: &GenerationRequest, axes: &[Axis]) -> Result<Self, CoreError> {
        let params = serde_json::to_value(base)
            .map_err(|e| CoreError::Internal(format!("Cannot encode base request: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            params,
            axis: axes.iter().map(Axis::descriptor).collect(),
        })
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Internal(format!("Cannot encode manifest: {e}")))
    }
}
