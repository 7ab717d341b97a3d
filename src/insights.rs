use crate::config::AnalyticsConfig;
use crate::models::{
    round2, Alert, AlertLevel, Insight, InsightKind, OutcomeScore, Role, TrendPoint,
};

pub fn alerts(
    scores: &[OutcomeScore],
    unmapped_courses: i64,
    config: &AnalyticsConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for score in scores {
        if score.score < config.danger_threshold {
            alerts.push(Alert {
                level: AlertLevel::Danger,
                message: format!(
                    "{} is critically low at {:.2} (below {})",
                    score.code, score.score, config.danger_threshold
                ),
            });
        } else if score.score < config.warning_threshold {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                message: format!(
                    "{} needs attention at {:.2} (below {})",
                    score.code, score.score, config.warning_threshold
                ),
            });
        }
    }

    if unmapped_courses > 0 {
        alerts.push(Alert {
            level: AlertLevel::Info,
            message: format!("{unmapped_courses} course(s) are not mapped to any learning outcome"),
        });
    }

    alerts
}

pub fn insights(scores: &[OutcomeScore], trend: &[TrendPoint]) -> Vec<Insight> {
    let mut insights = Vec::new();

    let by_score = |a: &&OutcomeScore, b: &&OutcomeScore| a.score.total_cmp(&b.score);
    let highest = scores.iter().max_by(by_score);
    let lowest = scores.iter().min_by(by_score);

    if let Some(best) = highest {
        insights.push(Insight {
            kind: InsightKind::Strongest,
            message: format!(
                "Strongest outcome is {} with an average of {}",
                best.code, best.score.round()
            ),
        });
    }
    if let (Some(worst), true) = (lowest, scores.len() > 1) {
        insights.push(Insight {
            kind: InsightKind::Weakest,
            message: format!(
                "Weakest outcome is {} with an average of {}",
                worst.code, worst.score.round()
            ),
        });
    }

    if let [.., previous, last] = trend {
        let change = round2(last.score - previous.score);
        insights.push(Insight {
            kind: InsightKind::Trend,
            message: format!(
                "Average score changed by {change:+.2} from {} to {}",
                previous.label, last.label
            ),
        });
    }

    insights
}

/// Alerts and insights a caller may see. Students receive neither.
pub fn for_caller(
    role: Role,
    scores: &[OutcomeScore],
    trend: &[TrendPoint],
    unmapped_courses: i64,
    config: &AnalyticsConfig,
) -> (Vec<Alert>, Vec<Insight>) {
    if role == Role::Student {
        return (Vec::new(), Vec::new());
    }
    (alerts(scores, unmapped_courses, config), insights(scores, trend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn outcome(code: &str, score: f64) -> OutcomeScore {
        OutcomeScore {
            lo_id: Uuid::new_v4(),
            code: code.to_string(),
            score,
        }
    }

    fn point(semester: i32, score: f64) -> TrendPoint {
        TrendPoint {
            semester,
            label: format!("Sem {semester}"),
            score,
        }
    }

    #[test]
    fn alert_levels_follow_thresholds() {
        let scores = vec![
            outcome("LO-1", 54.99),
            outcome("LO-2", 55.0),
            outcome("LO-3", 69.99),
            outcome("LO-4", 70.0),
        ];
        let alerts = alerts(&scores, 0, &AnalyticsConfig::default());

        let levels: Vec<AlertLevel> = alerts.iter().map(|a| a.level).collect();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], AlertLevel::Danger);
        assert_eq!(levels[1..], [AlertLevel::Warning, AlertLevel::Warning]);
        assert!(alerts[0].message.starts_with("LO-1"));
    }

    #[test]
    fn unmapped_courses_raise_info_alert() {
        let alerts = alerts(&[], 3, &AnalyticsConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Info);
        assert!(alerts[0].message.contains('3'));
    }

    #[test]
    fn names_strongest_and_weakest_outcomes() {
        let scores = vec![
            outcome("LO-1", 61.4),
            outcome("LO-2", 88.6),
            outcome("LO-3", 72.0),
        ];
        let insights = insights(&scores, &[]);

        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].kind, InsightKind::Strongest);
        assert!(insights[0].message.contains("LO-2") && insights[0].message.contains("89"));
        assert_eq!(insights[1].kind, InsightKind::Weakest);
        assert!(insights[1].message.contains("LO-1") && insights[1].message.contains("61"));
    }

    #[test]
    fn trend_insight_needs_two_points() {
        let single = insights(&[], &[point(1, 70.0)]);
        assert!(single.iter().all(|i| i.kind != InsightKind::Trend));

        let insights = insights(&[], &[point(1, 70.0), point(2, 80.5), point(3, 77.25)]);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Trend);
        assert!(insights[0].message.contains("-3.25"), "{}", insights[0].message);
        assert!(insights[0].message.contains("Sem 2 to Sem 3"));
    }

    #[test]
    fn students_get_no_alerts_or_insights() {
        let scores = vec![outcome("LO-1", 20.0)];
        let trend = vec![point(1, 20.0), point(2, 30.0)];
        let config = AnalyticsConfig::default();

        let (alerts, insights) = for_caller(Role::Student, &scores, &trend, 2, &config);
        assert!(alerts.is_empty() && insights.is_empty());

        let (alerts, insights) = for_caller(Role::Lecturer, &scores, &trend, 2, &config);
        assert_eq!(alerts.len(), 2);
        assert_eq!(insights.len(), 2);
    }
}
