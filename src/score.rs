use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    round2, CourseOutcomeWeight, GradeRow, LearningOutcome, OutcomeScore,
};
use crate::scope::OutcomePredicate;
use crate::store::Store;

/// Contribution weights keyed by (outcome, course).
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: HashMap<(Uuid, Uuid), f64>,
    default_weight: f64,
}

impl WeightTable {
    pub fn new(rows: &[CourseOutcomeWeight], default_weight: f64) -> Self {
        let weights = rows
            .iter()
            .map(|row| ((row.lo_id, row.course_id), row.weight))
            .collect();
        Self {
            weights,
            default_weight,
        }
    }

    pub fn get(&self, lo_id: Uuid, course_id: Uuid) -> Option<f64> {
        self.weights.get(&(lo_id, course_id)).copied()
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    numerator: f64,
    denominator: f64,
}

/// Per-outcome averages weighted by contribution weight times course credits,
/// rounded to two decimals. Outcomes with a zero denominator are left out.
pub fn weighted_scores(records: &[GradeRow], weights: &WeightTable) -> HashMap<Uuid, f64> {
    let mut totals: HashMap<Uuid, Accumulator> = HashMap::new();
    let mut unmapped: HashSet<(Uuid, Uuid)> = HashSet::new();

    for record in records {
        if !record.course.active {
            continue;
        }

        let weight = match weights.get(record.lo_id, record.course.id) {
            Some(weight) => weight,
            None => {
                if unmapped.insert((record.lo_id, record.course.id)) {
                    debug!(
                        lo = %record.lo_id,
                        course = %record.course.id,
                        weight = weights.default_weight(),
                        "no contribution weight; using default"
                    );
                }
                weights.default_weight()
            }
        };

        let credits = f64::from(record.course.credits);
        let entry = totals.entry(record.lo_id).or_default();
        entry.numerator += record.score * weight * credits;
        entry.denominator += weight * credits;
    }

    totals
        .into_iter()
        .filter(|(_, total)| total.denominator > 0.0)
        .map(|(lo_id, total)| (lo_id, round2(total.numerator / total.denominator)))
        .collect()
}

/// Attaches outcome codes and orders by code. Scores for outcomes missing
/// from `outcomes` are dropped.
pub fn label_scores(
    scores: &HashMap<Uuid, f64>,
    outcomes: &[LearningOutcome],
) -> Vec<OutcomeScore> {
    let codes: HashMap<Uuid, &str> = outcomes
        .iter()
        .map(|lo| (lo.id, lo.code.as_str()))
        .collect();

    let mut labelled: Vec<OutcomeScore> = scores
        .iter()
        .filter_map(|(lo_id, score)| match codes.get(lo_id) {
            Some(code) => Some(OutcomeScore {
                lo_id: *lo_id,
                code: code.to_string(),
                score: *score,
            }),
            None => {
                warn!(lo = %lo_id, "graded learning outcome not found; skipping");
                None
            }
        })
        .collect();

    labelled.sort_by(|a, b| a.code.cmp(&b.code));
    labelled
}

/// Unweighted mean over outcomes: each outcome counts once however many
/// records it has.
pub fn global_average(scores: &[OutcomeScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores.iter().map(|s| s.score).sum();
    round2(total / scores.len() as f64)
}

/// Loads the weights and outcome codes `records` refer to, one query each.
pub async fn load_reference<S: Store + ?Sized>(
    store: &S,
    records: &[GradeRow],
    default_weight: f64,
) -> StoreResult<(WeightTable, Vec<LearningOutcome>)> {
    let lo_ids = distinct(records.iter().map(|r| r.lo_id));
    let course_ids = distinct(records.iter().map(|r| r.course.id));

    let weight_rows = store
        .find_course_outcome_weights(&lo_ids, &course_ids)
        .await?;
    let outcomes = store
        .find_learning_outcomes(&OutcomePredicate::by_ids(&lo_ids))
        .await?;

    Ok((WeightTable::new(&weight_rows, default_weight), outcomes))
}

/// Labelled outcome scores for `records`, ordered by outcome code.
pub async fn score_outcomes<S: Store + ?Sized>(
    store: &S,
    records: &[GradeRow],
    default_weight: f64,
) -> StoreResult<Vec<OutcomeScore>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let (weights, outcomes) = load_reference(store, records, default_weight).await?;
    Ok(label_scores(&weighted_scores(records, &weights), &outcomes))
}

pub(crate) fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
