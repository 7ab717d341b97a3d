use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::coverage::{self, Rosters, SectionCoverage};
use crate::error::{DashboardError, StoreError, StoreResult};
use crate::insights;
use crate::models::{
    round1, AtRiskStudent, Caller, Completeness, DashboardStats, Filters, HeadlineStats,
    LecturerAnalysis, Role,
};
use crate::risk;
use crate::scope::FilterScope;
use crate::score::{self, distinct};
use crate::store::Store;
use crate::trend;

pub struct Dashboard<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a AnalyticsConfig,
}

fn unavailable(view: &'static str, err: StoreError) -> DashboardError {
    error!(view, error = %err, "dashboard query failed");
    DashboardError::Unavailable
}

fn share(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        round1((part / whole * 100.0).min(100.0))
    }
}

impl<'a, S: Store + ?Sized> Dashboard<'a, S> {
    pub fn new(store: &'a S, config: &'a AnalyticsConfig) -> Self {
        Self { store, config }
    }

    pub async fn stats(
        &self,
        caller: &Caller,
        filters: &Filters,
    ) -> Result<DashboardStats, DashboardError> {
        self.build_stats(caller, filters)
            .await
            .map_err(|err| unavailable("dashboard-stats", err))
    }

    pub async fn lecturer_analysis(
        &self,
        caller: &Caller,
        filters: &Filters,
    ) -> Result<Vec<LecturerAnalysis>, DashboardError> {
        self.build_lecturer_analysis(caller, filters)
            .await
            .map_err(|err| unavailable("lecturer-analysis", err))
    }

    pub async fn at_risk_students(
        &self,
        caller: &Caller,
        filters: &Filters,
    ) -> Result<Vec<AtRiskStudent>, DashboardError> {
        self.build_at_risk(caller, filters)
            .await
            .map_err(|err| unavailable("at-risk-students", err))
    }

    async fn resolve_scope(&self, caller: &Caller, filters: &Filters) -> StoreResult<FilterScope> {
        let assignments = if caller.role == Role::Lecturer {
            self.store.find_staff_assignments(&[caller.id]).await?
        } else {
            Vec::new()
        };
        Ok(FilterScope::resolve(caller, filters, &assignments))
    }

    async fn build_stats(&self, caller: &Caller, filters: &Filters) -> StoreResult<DashboardStats> {
        let scope = self.resolve_scope(caller, filters).await?;

        let users = self.store.count_users(&scope.users).await?;
        let lo = self.store.count_learning_outcomes(&scope.outcomes).await?;
        let courses = self.store.count_courses(&scope.courses).await?;
        let unmapped = self.store.count_unmapped_courses(&scope.courses).await?;
        let total_students = self.store.count_users(&scope.users.students()).await?;
        let records = self.store.find_grade_records(&scope.grades).await?;

        let weight = self.config.default_weight;
        let chart_data = score::score_outcomes(self.store, &records, weight).await?;
        let trend_data = trend::semester_trend(&records);
        let distribution_data = trend::score_distribution(&records);
        let performance_data = trend::top_performance(&chart_data, self.config.top_performance);
        let (alerts, insights) =
            insights::for_caller(scope.role, &chart_data, &trend_data, unmapped, self.config);

        let graded_students = records
            .iter()
            .map(|r| r.student_id)
            .collect::<HashSet<Uuid>>()
            .len();
        let mapped_courses = (courses - unmapped).max(0);

        debug!(
            role = %scope.role,
            records = records.len(),
            outcomes = chart_data.len(),
            "dashboard stats aggregated"
        );

        Ok(DashboardStats {
            stats: HeadlineStats {
                users,
                lo,
                courses,
                records: records.len(),
                avg_score: score::global_average(&chart_data),
            },
            completeness: Completeness {
                total_courses: courses,
                mapped_courses,
                mapping_percentage: share(mapped_courses as f64, courses as f64),
                total_students,
                graded_students,
                grading_percentage: share(graded_students as f64, total_students as f64),
            },
            chart_data,
            trend_data,
            distribution_data,
            performance_data,
            alerts,
            insights,
            generated_at: Utc::now(),
        })
    }

    async fn build_lecturer_analysis(
        &self,
        caller: &Caller,
        filters: &Filters,
    ) -> StoreResult<Vec<LecturerAnalysis>> {
        let scope = self.resolve_scope(caller, filters).await?;
        let lecturers = self.store.find_users(&scope.lecturers).await?;
        if lecturers.is_empty() {
            return Ok(Vec::new());
        }

        let lecturer_ids: Vec<Uuid> = lecturers.iter().map(|l| l.id).collect();
        let assignments: Vec<_> = self
            .store
            .find_staff_assignments(&lecturer_ids)
            .await?
            .into_iter()
            .filter_map(|a| scope.grades.restrict_assignment(&a))
            .collect();

        let course_ids = distinct(assignments.iter().map(|a| a.course_id));
        let records = if course_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .find_grade_records(&scope.grades.with_courses(&course_ids))
                .await?
        };

        let class_ids = coverage::assigned_classes(&assignments);
        let by_class = if class_ids.is_empty() {
            HashMap::new()
        } else {
            self.store.count_students_by_class(&class_ids).await?
        };
        let by_cohort = if assignments.iter().any(|a| a.class_id.is_none()) {
            self.store.count_students_by_program_semester().await?
        } else {
            HashMap::new()
        };
        let rosters = Rosters {
            by_class,
            by_cohort,
        };

        let mut sections: HashMap<Uuid, Vec<SectionCoverage>> = HashMap::new();
        for assignment in &assignments {
            sections
                .entry(assignment.lecturer_id)
                .or_default()
                .push(coverage::reconcile(assignment, &records, &rosters));
        }

        Ok(lecturers
            .iter()
            .map(|lecturer| {
                let coverage = sections
                    .get(&lecturer.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                coverage::summarize(lecturer, coverage)
            })
            .collect())
    }

    async fn build_at_risk(
        &self,
        caller: &Caller,
        filters: &Filters,
    ) -> StoreResult<Vec<AtRiskStudent>> {
        let scope = self.resolve_scope(caller, filters).await?;
        let limit = self.config.at_risk_candidate_limit;
        let candidates = self
            .store
            .find_users(&scope.users.students().with_limit(limit))
            .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if candidates.len() >= limit {
            info!(
                limit,
                "at-risk candidate pool reached its limit; later students were not examined"
            );
        }

        let student_ids: Vec<Uuid> = candidates.iter().map(|s| s.id).collect();
        let records = self
            .store
            .find_grade_records(&scope.grades.with_students(&student_ids))
            .await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let weight = self.config.default_weight;
        let (weights, outcomes) = score::load_reference(self.store, &records, weight).await?;

        Ok(risk::at_risk_students(
            &candidates,
            &records,
            &weights,
            &outcomes,
            self.config.danger_threshold,
        ))
    }
}
