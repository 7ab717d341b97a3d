use std::collections::BTreeMap;

use crate::models::{round2, DistributionBand, GradeRow, OutcomeScore, PerformanceEntry, TrendPoint};

/// Score bands, highest first: (name, inclusive lower bound).
const BANDS: [(&str, f64); 4] = [
    ("Excellent", 85.0),
    ("Good", 70.0),
    ("Fair", 60.0),
    ("Poor", 0.0),
];

/// Mean raw score per semester, ascending by semester.
pub fn semester_trend(records: &[GradeRow]) -> Vec<TrendPoint> {
    let mut by_semester: BTreeMap<i32, (f64, usize)> = BTreeMap::new();

    for record in records {
        let entry = by_semester.entry(record.semester).or_insert((0.0, 0));
        entry.0 += record.score;
        entry.1 += 1;
    }

    by_semester
        .into_iter()
        .map(|(semester, (total, count))| TrendPoint {
            semester,
            label: format!("Sem {semester}"),
            score: round2(total / count as f64),
        })
        .collect()
}

fn band_of(score: f64) -> usize {
    BANDS
        .iter()
        .position(|(_, floor)| score >= *floor)
        .unwrap_or(BANDS.len() - 1)
}

/// Histogram of raw record scores over the four bands.
pub fn score_distribution(records: &[GradeRow]) -> Vec<DistributionBand> {
    let mut counts = [0usize; BANDS.len()];
    for record in records {
        counts[band_of(record.score)] += 1;
    }

    let total = records.len();
    BANDS
        .iter()
        .zip(counts)
        .map(|((name, _), count)| {
            let percentage = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            DistributionBand {
                name: *name,
                count,
                percentage: format!("{percentage:.1}"),
            }
        })
        .collect()
}

pub fn performance_status(score: f64) -> &'static str {
    if score >= 80.0 {
        "Excellent"
    } else if score >= 70.0 {
        "Good"
    } else {
        "Need Improvement"
    }
}

/// The `limit` best-scoring outcomes, best first.
pub fn top_performance(scores: &[OutcomeScore], limit: usize) -> Vec<PerformanceEntry> {
    let mut ranked: Vec<&OutcomeScore> = scores.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    ranked
        .into_iter()
        .take(limit)
        .map(|s| PerformanceEntry {
            code: s.code.clone(),
            score: s.score,
            status: performance_status(s.score),
        })
        .collect()
}
