use serde::{Deserialize, Serialize};

/// Validator limits and error-spike thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiContractCfg {
    /// Endpoints beyond this are ignored.
    pub max_endpoints: usize,
    pub status_history: usize,
    /// 2xx responses learned before validation starts.
    pub min_calls_to_establish: u64,
    pub max_violations_per_endpoint: usize,
    pub max_shape_depth: usize,
    /// Statuses inspected before the current error streak.
    pub spike_window: usize,
    pub spike_min_errors: usize,
    pub spike_min_successes: usize,
}

impl Default for ApiContractCfg {
    fn default() -> Self {
        Self {
            max_endpoints: 30,
            status_history: 20,
            min_calls_to_establish: 3,
            max_violations_per_endpoint: 10,
            max_shape_depth: 3,
            spike_window: 10,
            spike_min_errors: 2,
            spike_min_successes: 2,
        }
    }
}
