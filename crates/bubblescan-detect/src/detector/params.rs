use serde::{Deserialize, Serialize};

use crate::{ConsensusParams, ExecutionMode, FilterParams, ParameterGrid};

/// Configuration for the bubble detector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleDetectorParams {
    /// Detector knobs to sweep.
    pub grid: ParameterGrid,
    pub consensus: ConsensusParams,
    pub filters: FilterParams,
    /// Sequential or parameter-level parallel sweep.
    pub execution: ExecutionMode,
}
