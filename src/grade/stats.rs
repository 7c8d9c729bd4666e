//! Summary statistics over stored scores.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

/// Mean, median and mode of a non-empty score collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ScoreSummary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Median; the average of the two middle values for even counts.
    pub median: f64,
    /// Most frequent score; ties go to the value seen first.
    pub mode: i32,
}

/// Summarize `scores`, or `None` when there is nothing to summarize.
pub fn summarize(scores: &[i32]) -> Option<ScoreSummary> {
    Some(ScoreSummary {
        mean: mean(scores)?,
        median: median(scores)?,
        mode: mode(scores)?,
    })
}

/// Arithmetic mean.
pub fn mean(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: i64 = scores.iter().map(|&s| i64::from(s)).sum();
    Some(sum as f64 / scores.len() as f64)
}

/// Median of the sorted scores.
pub fn median(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(f64::from(sorted[mid]))
    } else {
        Some((f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0)
    }
}

/// Most frequent score. When several share the highest count, the one that
/// occurs first in `scores` wins.
pub fn mode(scores: &[i32]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for &score in scores {
        *counts.entry(score).or_insert(0) += 1;
    }
    let highest = counts.values().copied().max()?;

    scores.iter().copied().find(|score| counts[score] == highest)
}
