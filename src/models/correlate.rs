//! Run correlation request and report.

use crate::models::RunId;
use serde::{Deserialize, Serialize};

/// Ask the server to match a run's GPS points against received telegrams.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelateRequest {
    pub run_id: RunId,
    /// Correlation window in seconds; server default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corr_window: Option<i64>,
}

/// Outcome of a correlation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub success: bool,
    /// Newly derived transmission locations (0 if the run was already correlated)
    #[serde(default)]
    pub new_raw_transmission_locations: i64,
}
