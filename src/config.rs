/// Configuration of the tab tree cache
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

use crate::error::CacheError;
use crate::scheduler::ProgressRange;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Dump cache markup to the log while restoring
    pub debug: bool,
    /// Time the fixup pass may run before yielding a frame
    pub yield_interval_ms: f64,
    /// Progress shown when the fixup pass starts
    pub progress_start: u8,
    /// Progress shown when the fixup pass ends
    pub progress_end: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            debug: false,
            yield_interval_ms: 16.0,
            progress_start: 33,
            progress_end: 100,
        }
    }
}

impl CacheConfig {
    pub fn from_json(json: &str) -> Result<CacheConfig, CacheError> {
        serde_json::from_str::<CacheConfig>(json)
            .map(CacheConfig::normalized)
            .map_err(|e| CacheError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Decode the configuration object handed over by the sidebar page
    pub fn from_js(value: JsValue) -> Result<CacheConfig, CacheError> {
        if value.is_null() || value.is_undefined() {
            return Ok(CacheConfig::default());
        }
        serde_wasm_bindgen::from_value::<CacheConfig>(value)
            .map(CacheConfig::normalized)
            .map_err(|e| CacheError::Config(format!("Failed to parse config: {:?}", e)))
    }

    /// Clamp out-of-range values instead of rejecting the whole configuration
    pub fn normalized(mut self) -> CacheConfig {
        self.progress_end = self.progress_end.min(100);
        self.progress_start = self.progress_start.min(100);
        if self.progress_start > self.progress_end {
            std::mem::swap(&mut self.progress_start, &mut self.progress_end);
        }
        if !self.yield_interval_ms.is_finite() || self.yield_interval_ms < 0.0 {
            self.yield_interval_ms = CacheConfig::default().yield_interval_ms;
        }
        self
    }

    pub fn progress_range(&self) -> ProgressRange {
        ProgressRange::new(self.progress_start, self.progress_end)
    }
}
