use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{LivenessConfig, StepName};

/// Health snapshot. Building one never claims the capture device.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub camera_available: bool,
    pub models_loaded: BTreeMap<StepName, bool>,
    pub configuration: LivenessConfig,
    pub timestamp: DateTime<Utc>,
}

impl SystemStatus {
    /// Camera present and every step's models loaded.
    pub fn is_ready(&self) -> bool {
        self.camera_available && self.models_loaded.values().all(|&ok| ok)
    }
}
