use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{AtRiskStudent, GradeRow, LearningOutcome, LowOutcome, UserSummary};
use crate::score::{global_average, label_scores, weighted_scores, WeightTable};

/// Flags every student in `students` whose mean outcome score is above zero
/// and below `threshold`. Most low outcomes first, then lowest mean.
pub fn at_risk_students(
    students: &[UserSummary],
    records: &[GradeRow],
    weights: &WeightTable,
    outcomes: &[LearningOutcome],
    threshold: f64,
) -> Vec<AtRiskStudent> {
    let mut by_student: HashMap<Uuid, Vec<GradeRow>> = HashMap::new();
    for record in records {
        by_student
            .entry(record.student_id)
            .or_default()
            .push(record.clone());
    }

    let mut flagged: Vec<AtRiskStudent> = students
        .iter()
        .filter_map(|student| {
            let records = by_student.get(&student.id)?;
            let scores = label_scores(&weighted_scores(records, weights), outcomes);
            let avg_lo = global_average(&scores);
            if avg_lo <= 0.0 || avg_lo >= threshold {
                return None;
            }

            let low_lo_details: Vec<LowOutcome> = scores
                .iter()
                .filter(|s| s.score < threshold)
                .map(|s| LowOutcome {
                    code: s.code.clone(),
                    score: s.score,
                })
                .collect();

            Some(AtRiskStudent {
                id: student.id,
                name: student.name.clone(),
                student_number: student.identifier.clone(),
                avg_lo,
                low_lo_count: low_lo_details.len(),
                low_lo_details,
            })
        })
        .collect();

    rank(&mut flagged);
    flagged
}

pub fn rank(students: &mut [AtRiskStudent]) {
    students.sort_by(|a, b| {
        b.low_lo_count.cmp(&a.low_lo_count).then_with(|| {
            a.avg_lo
                .partial_cmp(&b.avg_lo)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
}
