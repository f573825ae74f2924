//! Consensus recovery.
//!
//! Circles that the top-scoring combinations agree on, but that the single
//! best combination missed, are added back to the result.

use std::collections::HashMap;

use bubblescan_core::Circle;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::DetectionResult;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Share of results (by score) that take part in the vote.
    pub top_percentage: f32,
    /// Share of the voting results a location must appear in.
    pub min_frequency_ratio: f32,
    /// Cell size for location grouping and match radius, in pixels.
    pub location_tolerance: f32,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            top_percentage: 0.4,
            min_frequency_ratio: 0.4,
            location_tolerance: 15.0,
        }
    }
}

/// A location the top results agree on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusCircle {
    /// Mean of every circle that fell into the location cell.
    pub circle: Circle,
    /// Number of distinct results contributing to the cell.
    pub frequency: usize,
    /// Mean score of the contributing results.
    pub avg_score: f32,
    /// Keys of the contributing combinations.
    pub contributing_params: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    BestResult,
    ConsensusRecovery,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircleProvenance {
    pub source: ProvenanceSource,
    pub frequency: usize,
    pub avg_score: f32,
    pub contributing_params: Vec<String>,
}

impl CircleProvenance {
    fn bare_best() -> Self {
        Self {
            source: ProvenanceSource::BestResult,
            frequency: 1,
            avg_score: 0.0,
            contributing_params: Vec::new(),
        }
    }

    fn from_consensus(source: ProvenanceSource, c: &ConsensusCircle) -> Self {
        Self {
            source,
            frequency: c.frequency,
            avg_score: c.avg_score,
            contributing_params: c.contributing_params.clone(),
        }
    }
}

/// Output circle with the reason it is in the result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveredCircle {
    pub circle: Circle,
    pub provenance: CircleProvenance,
}

impl AsRef<Circle> for RecoveredCircle {
    fn as_ref(&self) -> &Circle {
        &self.circle
    }
}

#[derive(Default)]
struct Cell {
    sum_x: f32,
    sum_y: f32,
    sum_r: f32,
    circles: usize,
    results: Vec<usize>,
}

/// Locations seen in at least `min_frequency_ratio` of the top results.
///
/// Results are ranked by score (ties by enumeration index). Cells are
/// reported in first-seen order.
pub fn find_consensus_circles(
    results: &[DetectionResult],
    params: &ConsensusParams,
) -> Vec<ConsensusCircle> {
    let tol = params.location_tolerance;
    if results.is_empty() || !(tol.is_finite() && tol > 0.0) {
        return Vec::new();
    }

    let mut ranked: Vec<&DetectionResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
    let top_n = ((results.len() as f32 * params.top_percentage).floor() as usize)
        .clamp(1, results.len());
    let top = &ranked[..top_n];

    let mut order: Vec<(i64, i64)> = Vec::new();
    let mut cells: HashMap<(i64, i64), Cell> = HashMap::new();
    for (slot, result) in top.iter().enumerate() {
        for c in &result.circles {
            let key = (
                (c.center_x / tol).round_ties_even() as i64,
                (c.center_y / tol).round_ties_even() as i64,
            );
            let cell = cells.entry(key).or_insert_with(|| {
                order.push(key);
                Cell::default()
            });
            cell.sum_x += c.center_x;
            cell.sum_y += c.center_y;
            cell.sum_r += c.radius;
            cell.circles += 1;
            if cell.results.last() != Some(&slot) {
                cell.results.push(slot);
            }
        }
    }

    let min_frequency =
        ((top_n as f32 * params.min_frequency_ratio).ceil() as usize).max(1);
    debug!(
        "consensus over top {} of {} results, {} cells, min frequency {}",
        top_n,
        results.len(),
        order.len(),
        min_frequency
    );

    order
        .into_iter()
        .filter_map(|key| {
            let cell = cells.remove(&key)?;
            if cell.results.len() < min_frequency {
                return None;
            }
            let n = cell.circles as f32;
            let avg_score = cell.results.iter().map(|&s| top[s].score).sum::<f32>()
                / cell.results.len() as f32;
            Some(ConsensusCircle {
                circle: Circle::new(cell.sum_x / n, cell.sum_y / n, cell.sum_r / n),
                frequency: cell.results.len(),
                avg_score,
                contributing_params: cell.results.iter().map(|&s| top[s].combo.key()).collect(),
            })
        })
        .collect()
}

/// Best circles plus consensus circles the best result missed.
///
/// The best circles keep their order and come first; recovered circles are
/// appended in consensus order.
pub fn apply_consensus_recovery(
    best: &[Circle],
    results: &[DetectionResult],
    params: &ConsensusParams,
) -> Vec<RecoveredCircle> {
    let tol = params.location_tolerance;
    if !(tol.is_finite() && tol > 0.0) {
        warn!("consensus disabled: invalid location tolerance {tol}");
    }
    let consensus = find_consensus_circles(results, params);

    let mut enhanced: Vec<RecoveredCircle> = best
        .iter()
        .map(|c| {
            let provenance = consensus
                .iter()
                .find(|cc| cc.circle.center_distance(c) <= tol)
                .map_or_else(CircleProvenance::bare_best, |cc| {
                    CircleProvenance::from_consensus(ProvenanceSource::BestResult, cc)
                });
            RecoveredCircle {
                circle: *c,
                provenance,
            }
        })
        .collect();

    let mut recovered = 0usize;
    for cc in &consensus {
        let present = enhanced
            .iter()
            .any(|e| e.circle.center_distance(&cc.circle) <= tol);
        if present {
            continue;
        }
        debug!(
            "recovered circle at ({:.1}, {:.1}), seen {} times, avg score {:.3}",
            cc.circle.center_x, cc.circle.center_y, cc.frequency, cc.avg_score
        );
        enhanced.push(RecoveredCircle {
            circle: cc.circle,
            provenance: CircleProvenance::from_consensus(ProvenanceSource::ConsensusRecovery, cc),
        });
        recovered += 1;
    }

    info!(
        "consensus: {} best circles, {} consensus locations, {} recovered",
        best.len(),
        consensus.len(),
        recovered
    );
    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bubblescan_hough::ParameterCombination;

    fn result(index: usize, score: f32, circles: Vec<Circle>) -> DetectionResult {
        DetectionResult {
            index,
            combo: ParameterCombination::new(1.0, 0.4, 5.0, 220 + index as u8, 100.0),
            score,
            circles,
        }
    }

    fn c(x: f32, y: f32) -> Circle {
        Circle::new(x, y, 10.0)
    }

    #[test]
    fn recovers_circle_missing_from_best() {
        let best = vec![c(100.0, 100.0), c(200.0, 100.0)];
        let results = vec![
            result(0, 0.9, best.clone()),
            result(1, 0.8, vec![c(101.0, 100.0), c(200.0, 101.0), c(300.0, 100.0)]),
            result(2, 0.7, vec![c(99.0, 100.0), c(302.0, 100.0)]),
            result(3, 0.1, vec![c(500.0, 500.0)]),
        ];
        let params = ConsensusParams {
            top_percentage: 0.75,
            min_frequency_ratio: 0.6,
            location_tolerance: 15.0,
        };
        let out = apply_consensus_recovery(&best, &results, &params);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].circle, best[0]);
        assert_eq!(out[0].provenance.frequency, 3);
        assert_eq!(out[1].provenance.source, ProvenanceSource::BestResult);
        let rec = &out[2];
        assert_eq!(rec.provenance.source, ProvenanceSource::ConsensusRecovery);
        assert_eq!(rec.provenance.frequency, 2);
        assert_relative_eq!(rec.circle.center_x, 301.0, epsilon = 1e-4);
        assert_relative_eq!(rec.provenance.avg_score, 0.75, epsilon = 1e-6);
        assert_eq!(rec.provenance.contributing_params.len(), 2);
    }

    #[test]
    fn lenient_settings_return_superset_of_best() {
        let best = vec![c(50.0, 50.0), c(400.0, 50.0)];
        let results = vec![
            result(0, 0.5, best.clone()),
            result(1, 0.4, vec![c(120.0, 50.0)]),
            result(2, 0.3, vec![]),
        ];
        let params = ConsensusParams {
            top_percentage: 1.0,
            min_frequency_ratio: 0.0,
            location_tolerance: 15.0,
        };
        let out = apply_consensus_recovery(&best, &results, &params);
        for b in &best {
            assert!(out.iter().any(|r| r.circle == *b));
        }
        assert!(out.len() >= best.len());
        assert!(out.iter().any(|r| r.circle.center_x == 120.0));
    }

    #[test]
    fn frequency_counts_distinct_results() {
        // One result with two circles in the same cell only votes once.
        let results = vec![
            result(0, 0.9, vec![c(100.0, 100.0), c(102.0, 101.0)]),
            result(1, 0.8, vec![c(400.0, 400.0)]),
        ];
        let params = ConsensusParams {
            top_percentage: 1.0,
            min_frequency_ratio: 1.0,
            location_tolerance: 15.0,
        };
        assert!(find_consensus_circles(&results, &params).is_empty());
    }

    #[test]
    fn top_selection_keeps_at_least_one_result() {
        let results = vec![result(0, 0.2, vec![c(10.0, 10.0)]), result(1, 0.6, vec![c(90.0, 90.0)])];
        let params = ConsensusParams {
            top_percentage: 0.1,
            ..ConsensusParams::default()
        };
        let found = find_consensus_circles(&results, &params);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].circle.center_x, 90.0);
    }

    #[test]
    fn no_results_keeps_best_untouched() {
        let best = vec![c(10.0, 10.0)];
        let out = apply_consensus_recovery(&best, &[], &ConsensusParams::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provenance, CircleProvenance::bare_best());
    }
}
