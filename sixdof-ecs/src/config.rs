// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Simulation configuration
//!
//! [`SimulationConfig`] gathers the knobs shared by the pipeline and the
//! simulation driver. It can be built in code with the `with_*` methods or
//! loaded from JSON; missing fields take their defaults.
//!
//! ```
//! use sixdof_ecs::config::SimulationConfig;
//! use sixdof_ecs::ecs::ExecutionMode;
//!
//! let config = SimulationConfig::from_json_str(
//!     r#"{ "time_step": 0.01, "execution": "parallel" }"#,
//! ).unwrap();
//! assert_eq!(config.time_step, 0.01);
//! assert_eq!(config.execution, ExecutionMode::Parallel);
//! assert!(config.clear_forces);
//! ```

use crate::ecs::ExecutionMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default fixed timestep (60 Hz)
pub const DEFAULT_TIME_STEP: f64 = 1.0 / 60.0;

/// Default minimum row count before a system evaluates rows in parallel
pub const DEFAULT_PARALLEL_ROW_THRESHOLD: usize = 1024;

/// Configuration for building and running a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed timestep in seconds
    pub time_step: f64,

    /// Whether independent systems run concurrently
    pub execution: ExecutionMode,

    /// Row count at which a single system evaluates its rows on the rayon
    /// pool; only used in parallel execution mode
    pub parallel_row_threshold: usize,

    /// Reset every `Force` to zero after integration
    pub clear_forces: bool,

    /// Number of per-tick snapshots to retain; `None` disables history
    pub history_capacity: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            time_step: DEFAULT_TIME_STEP,
            execution: ExecutionMode::Sequential,
            parallel_row_threshold: DEFAULT_PARALLEL_ROW_THRESHOLD,
            clear_forces: true,
            history_capacity: None,
        }
    }
}

impl SimulationConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed timestep
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Set the execution mode
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Set the row-parallelism threshold
    pub fn with_parallel_row_threshold(mut self, threshold: usize) -> Self {
        self.parallel_row_threshold = threshold;
        self
    }

    /// Keep or clear forces after integration
    pub fn with_clear_forces(mut self, clear_forces: bool) -> Self {
        self.clear_forces = clear_forces;
        self
    }

    /// Retain up to `capacity` snapshots
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Row threshold to hand to systems, `None` when rows stay sequential
    pub fn row_parallelism(&self) -> Option<usize> {
        match self.execution {
            ExecutionMode::Parallel => Some(self.parallel_row_threshold),
            ExecutionMode::Sequential => None,
        }
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(Error::InvalidTimestep(self.time_step));
        }
        if self.parallel_row_threshold == 0 {
            return Err(Error::InvalidConfig(
                "parallel_row_threshold must be at least 1".to_string(),
            ));
        }
        if self.history_capacity == Some(0) {
            return Err(Error::InvalidConfig(
                "history_capacity must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
