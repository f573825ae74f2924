use bubblescan_core::Circle;
use bubblescan_hough::ParameterCombination;
use serde::{Deserialize, Serialize};

use crate::{CombinationRecord, FilterReport, RecoveredCircle, SweepDiagnostics};

/// Output of one region detection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BubbleDetection {
    /// Final circles in region pixels, best-result circles first.
    pub circles: Vec<RecoveredCircle>,
    pub best_score: Option<f32>,
    pub best_combo: Option<ParameterCombination>,
    pub filter_report: FilterReport,
    pub records: Vec<CombinationRecord>,
    pub diagnostics: SweepDiagnostics,
}

impl BubbleDetection {
    pub fn circles(&self) -> impl Iterator<Item = &Circle> + '_ {
        self.circles.iter().map(|c| &c.circle)
    }

    pub fn is_empty(&self) -> bool {
        self.circles.is_empty()
    }
}
