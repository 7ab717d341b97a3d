use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    CohortKey, CourseCredit, CourseOutcomeWeight, GradeRow, LearningOutcome, Role,
    StaffAssignment, UserSummary,
};
use crate::scope::{CoursePredicate, GradePredicate, OutcomePredicate, StudentGroup, UserPredicate};
use crate::store::Store;

const USER_COLUMNS: &str = "u.id, u.full_name, u.role, u.identifier, u.program_id, u.class_id, \
     u.cohort_year, u.semester";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_db(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn seed(&self) -> StoreResult<()> {
        crate::seed::load(&self.pool).await
    }
}

fn push_id_set(qb: &mut QueryBuilder<'_, Postgres>, column: &str, ids: &[Uuid]) {
    qb.push(format!(" AND {column} = ANY("))
        .push_bind(ids.to_vec())
        .push(")");
}

fn push_faculty(qb: &mut QueryBuilder<'_, Postgres>, program_column: &str, faculty_id: Uuid) {
    qb.push(format!(
        " AND {program_column} IN (SELECT p.id FROM outcomes.programs p WHERE p.faculty_id = "
    ))
    .push_bind(faculty_id)
    .push(")");
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, predicate: &UserPredicate) {
    if predicate.matches_nothing() {
        qb.push(" AND FALSE");
        return;
    }
    if let Some(ids) = &predicate.ids {
        push_id_set(qb, "u.id", ids);
    }
    if let Some(role) = predicate.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(program_id) = predicate.program_id {
        qb.push(" AND u.program_id = ").push_bind(program_id);
    }
    if let Some(faculty_id) = predicate.faculty_id {
        push_faculty(qb, "u.program_id", faculty_id);
    }
    if let Some(cohort_year) = predicate.cohort_year {
        qb.push(" AND u.cohort_year = ").push_bind(cohort_year);
    }
    if let Some(class_id) = predicate.class_id {
        qb.push(" AND u.class_id = ").push_bind(class_id);
    }
    if let Some(groups) = &predicate.groups {
        qb.push(" AND (");
        for (index, group) in groups.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            match group {
                StudentGroup::Class(class_id) => {
                    qb.push("u.class_id = ").push_bind(*class_id);
                }
                StudentGroup::Cohort(key) => {
                    qb.push("(u.program_id = ")
                        .push_bind(key.program_id)
                        .push(" AND u.semester = ")
                        .push_bind(key.semester)
                        .push(")");
                }
            }
        }
        qb.push(")");
    }
    if predicate.active_only {
        qb.push(" AND u.is_active");
    }
}

fn push_outcome_filters(qb: &mut QueryBuilder<'_, Postgres>, predicate: &OutcomePredicate) {
    if predicate.matches_nothing() {
        qb.push(" AND FALSE");
        return;
    }
    if let Some(ids) = &predicate.ids {
        push_id_set(qb, "lo.id", ids);
    }
    if let Some(program_ids) = &predicate.program_ids {
        push_id_set(qb, "lo.program_id", program_ids);
    }
    if let Some(faculty_id) = predicate.faculty_id {
        push_faculty(qb, "lo.program_id", faculty_id);
    }
}

fn push_course_filters(qb: &mut QueryBuilder<'_, Postgres>, predicate: &CoursePredicate) {
    if predicate.matches_nothing() {
        qb.push(" AND FALSE");
        return;
    }
    if let Some(ids) = &predicate.ids {
        push_id_set(qb, "c.id", ids);
    }
    if let Some(program_ids) = &predicate.program_ids {
        push_id_set(qb, "c.program_id", program_ids);
    }
    if let Some(faculty_id) = predicate.faculty_id {
        push_faculty(qb, "c.program_id", faculty_id);
    }
    if let Some(semester) = predicate.semester {
        qb.push(" AND c.semester = ").push_bind(semester);
    }
}

fn push_grade_filters(qb: &mut QueryBuilder<'_, Postgres>, predicate: &GradePredicate) {
    if predicate.matches_nothing() {
        qb.push(" AND FALSE");
        return;
    }
    if let Some(student_ids) = &predicate.student_ids {
        push_id_set(qb, "g.student_id", student_ids);
    }
    if let Some(program_id) = predicate.program_id {
        qb.push(" AND u.program_id = ").push_bind(program_id);
    }
    if let Some(faculty_id) = predicate.faculty_id {
        push_faculty(qb, "u.program_id", faculty_id);
    }
    if let Some(cohort_year) = predicate.cohort_year {
        qb.push(" AND u.cohort_year = ").push_bind(cohort_year);
    }
    if let Some(class_id) = predicate.class_id {
        qb.push(" AND u.class_id = ").push_bind(class_id);
    }
    if let Some(course_ids) = &predicate.course_ids {
        push_id_set(qb, "g.course_id", course_ids);
    }
    if let Some(sections) = &predicate.sections {
        qb.push(" AND (");
        for (index, section) in sections.iter().enumerate() {
            if index > 0 {
                qb.push(" OR ");
            }
            qb.push("(g.course_id = ").push_bind(section.course_id);
            if let Some(class_id) = section.class_id {
                qb.push(" AND u.class_id = ").push_bind(class_id);
            }
            qb.push(")");
        }
        qb.push(")");
    }
    if let Some(semester) = predicate.semester {
        qb.push(" AND g.semester = ").push_bind(semester);
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<UserSummary> {
    let role: String = row.try_get("role")?;
    let role: Role = role.parse().map_err(StoreError::InvalidRow)?;
    Ok(UserSummary {
        id: row.try_get("id")?,
        name: row.try_get("full_name")?,
        role,
        identifier: row.try_get("identifier")?,
        program_id: row.try_get("program_id")?,
        class_id: row.try_get("class_id")?,
        cohort_year: row.try_get("cohort_year")?,
        semester: row.try_get("semester")?,
    })
}

impl PgStore {
    async fn count(&self, mut qb: QueryBuilder<'_, Postgres>) -> StoreResult<i64> {
        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_users(&self, predicate: &UserPredicate) -> StoreResult<Vec<UserSummary>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM outcomes.users u WHERE TRUE"
        ));
        push_user_filters(&mut qb, predicate);
        qb.push(" ORDER BY u.full_name, u.id");
        if let Some(limit) = predicate.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn count_users(&self, predicate: &UserPredicate) -> StoreResult<i64> {
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM (SELECT u.id FROM outcomes.users u WHERE TRUE",
        );
        push_user_filters(&mut qb, predicate);
        if let Some(limit) = predicate.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        qb.push(") scoped");
        self.count(qb).await
    }

    async fn find_grade_records(&self, predicate: &GradePredicate) -> StoreResult<Vec<GradeRow>> {
        let mut qb = QueryBuilder::new(
            "SELECT g.student_id, u.class_id, u.program_id, u.semester AS student_semester, \
             g.lo_id, g.course_id, c.credits, c.is_active, g.score, g.semester \
             FROM outcomes.grade_records g \
             JOIN outcomes.users u ON u.id = g.student_id \
             JOIN outcomes.courses c ON c.id = g.course_id \
             WHERE c.is_active",
        );
        push_grade_filters(&mut qb, predicate);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(GradeRow {
                student_id: row.try_get("student_id")?,
                student_class_id: row.try_get("class_id")?,
                student_program_id: row.try_get("program_id")?,
                student_semester: row.try_get("student_semester")?,
                lo_id: row.try_get("lo_id")?,
                course: CourseCredit {
                    id: row.try_get("course_id")?,
                    credits: row.try_get("credits")?,
                    active: row.try_get("is_active")?,
                },
                score: row.try_get("score")?,
                semester: row.try_get("semester")?,
            });
        }
        Ok(records)
    }

    async fn find_course_outcome_weights(
        &self,
        lo_ids: &[Uuid],
        course_ids: &[Uuid],
    ) -> StoreResult<Vec<CourseOutcomeWeight>> {
        if lo_ids.is_empty() || course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT lo_id, course_id, weight FROM outcomes.course_outcome_weights \
             WHERE lo_id = ANY($1) AND course_id = ANY($2)",
        )
        .bind(lo_ids)
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut weights = Vec::with_capacity(rows.len());
        for row in rows {
            weights.push(CourseOutcomeWeight {
                lo_id: row.try_get("lo_id")?,
                course_id: row.try_get("course_id")?,
                weight: row.try_get("weight")?,
            });
        }
        Ok(weights)
    }

    async fn find_learning_outcomes(
        &self,
        predicate: &OutcomePredicate,
    ) -> StoreResult<Vec<LearningOutcome>> {
        let mut qb = QueryBuilder::new(
            "SELECT lo.id, lo.code FROM outcomes.learning_outcomes lo WHERE TRUE",
        );
        push_outcome_filters(&mut qb, predicate);
        qb.push(" ORDER BY lo.code");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            outcomes.push(LearningOutcome {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
            });
        }
        Ok(outcomes)
    }

    async fn count_learning_outcomes(&self, predicate: &OutcomePredicate) -> StoreResult<i64> {
        let mut qb =
            QueryBuilder::new("SELECT COUNT(*) FROM outcomes.learning_outcomes lo WHERE TRUE");
        push_outcome_filters(&mut qb, predicate);
        self.count(qb).await
    }

    async fn count_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM outcomes.courses c WHERE c.is_active");
        push_course_filters(&mut qb, predicate);
        self.count(qb).await
    }

    async fn count_unmapped_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64> {
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM outcomes.courses c WHERE c.is_active \
             AND NOT EXISTS (SELECT 1 FROM outcomes.course_outcome_weights w \
             WHERE w.course_id = c.id)",
        );
        push_course_filters(&mut qb, predicate);
        self.count(qb).await
    }

    async fn find_staff_assignments(
        &self,
        lecturer_ids: &[Uuid],
    ) -> StoreResult<Vec<StaffAssignment>> {
        if lecturer_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT a.lecturer_id, a.course_id, a.class_id, c.program_id, c.semester \
             FROM outcomes.staff_assignments a \
             JOIN outcomes.courses c ON c.id = a.course_id \
             WHERE a.lecturer_id = ANY($1) \
             ORDER BY a.lecturer_id, c.code",
        )
        .bind(lecturer_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            assignments.push(StaffAssignment {
                lecturer_id: row.try_get("lecturer_id")?,
                course_id: row.try_get("course_id")?,
                class_id: row.try_get("class_id")?,
                course_cohort: CohortKey {
                    program_id: row.try_get("program_id")?,
                    semester: row.try_get("semester")?,
                },
            });
        }
        Ok(assignments)
    }

    async fn count_students_by_class(&self, class_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        if class_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT class_id, COUNT(*) AS students FROM outcomes.users \
             WHERE role = 'student' AND is_active AND class_id = ANY($1) \
             GROUP BY class_id",
        )
        .bind(class_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let class_id: Uuid = row.try_get("class_id")?;
            counts.insert(class_id, row.try_get("students")?);
        }
        Ok(counts)
    }

    async fn count_students_by_program_semester(&self) -> StoreResult<HashMap<CohortKey, i64>> {
        let rows = sqlx::query(
            "SELECT program_id, semester, COUNT(*) AS students FROM outcomes.users \
             WHERE role = 'student' AND is_active \
             AND program_id IS NOT NULL AND semester IS NOT NULL \
             GROUP BY program_id, semester",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let key = CohortKey {
                program_id: row.try_get("program_id")?,
                semester: row.try_get("semester")?,
            };
            counts.insert(key, row.try_get("students")?);
        }
        debug!(cohorts = counts.len(), "loaded cohort rosters");
        Ok(counts)
    }
}
