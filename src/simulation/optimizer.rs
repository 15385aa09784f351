//! Optimal-risk selection over a sweep

use serde::{Deserialize, Serialize};

use super::monte_carlo::SweepPoint;

/// What the selector maximizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    MedianFinal,
    WorstFinal,
    TargetHitRate,
}

impl Criterion {
    pub fn score(&self, point: &SweepPoint) -> f64 {
        match self {
            Self::MedianFinal => point.median_final,
            Self::WorstFinal => point.worst_final,
            Self::TargetHitRate => point.target_hit_rate(),
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MedianFinal => write!(f, "median final balance"),
            Self::WorstFinal => write!(f, "worst final balance"),
            Self::TargetHitRate => write!(f, "target hit rate"),
        }
    }
}

/// Chosen sweep point
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub index: usize,
    pub point: &'a SweepPoint,
    /// False when a failure threshold was requested but no level satisfied it
    /// and the unconstrained maximum was used instead
    pub within_threshold: bool,
}

/// Stable argmax: first occurrence wins ties
fn argmax<'a>(
    points: impl Iterator<Item = (usize, &'a SweepPoint)>,
    criterion: Criterion,
) -> Option<(usize, &'a SweepPoint)> {
    let mut best: Option<(usize, &SweepPoint, f64)> = None;
    for (idx, point) in points {
        let score = criterion.score(point);
        match best {
            Some((_, _, best_score)) if score <= best_score => {}
            _ => best = Some((idx, point, score)),
        }
    }
    best.map(|(idx, point, _)| (idx, point))
}

/// Pick the sweep point maximizing `criterion`.
///
/// With `max_failure_rate`, only points whose failure rate is strictly below it
/// are candidates; when none qualifies the unconstrained maximum is returned.
pub fn select_optimal(
    points: &[SweepPoint],
    criterion: Criterion,
    max_failure_rate: Option<f64>,
) -> Option<Selection<'_>> {
    if let Some(threshold) = max_failure_rate {
        let constrained = argmax(
            points
                .iter()
                .enumerate()
                .filter(|(_, p)| p.failure_rate() < threshold),
            criterion,
        );
        if let Some((index, point)) = constrained {
            return Some(Selection {
                index,
                point,
                within_threshold: true,
            });
        }
    }

    argmax(points.iter().enumerate(), criterion).map(|(index, point)| Selection {
        index,
        point,
        within_threshold: max_failure_rate.is_none(),
    })
}
