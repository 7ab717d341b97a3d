use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    CohortKey, CourseCredit, CourseOutcomeWeight, GradeRow, LearningOutcome, Role,
    StaffAssignment, UserSummary,
};
use crate::scope::{CoursePredicate, GradePredicate, OutcomePredicate, StudentGroup, UserPredicate};

#[derive(Debug, Clone)]
struct StoredUser {
    summary: UserSummary,
    active: bool,
}

#[derive(Debug, Clone)]
struct StoredCourse {
    id: Uuid,
    credits: i32,
    semester: i32,
    program_id: Uuid,
    active: bool,
}

#[derive(Debug, Clone)]
struct StoredGrade {
    student_id: Uuid,
    lo_id: Uuid,
    course_id: Uuid,
    score: f64,
    semester: i32,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    program_faculty: HashMap<Uuid, Uuid>,
    users: Vec<StoredUser>,
    outcomes: Vec<(LearningOutcome, Uuid)>,
    courses: Vec<StoredCourse>,
    weights: Vec<CourseOutcomeWeight>,
    grades: Vec<StoredGrade>,
    assignments: Vec<(Uuid, Uuid, Option<Uuid>)>,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent query fails as if the database were unreachable.
    pub fn fail_queries(&mut self) {
        self.failing = true;
    }

    pub fn add_program(&mut self, faculty_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.program_faculty.insert(id, faculty_id);
        id
    }

    pub fn add_student(
        &mut self,
        name: &str,
        program_id: Uuid,
        class_id: Option<Uuid>,
        cohort_year: i32,
        semester: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.users.push(StoredUser {
            summary: UserSummary {
                id,
                name: name.to_string(),
                role: Role::Student,
                identifier: Some(format!("S-{}", self.users.len() + 1)),
                program_id: Some(program_id),
                class_id,
                cohort_year: Some(cohort_year),
                semester: Some(semester),
            },
            active: true,
        });
        id
    }

    pub fn add_staff(&mut self, name: &str, role: Role, program_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.users.push(StoredUser {
            summary: UserSummary {
                id,
                name: name.to_string(),
                role,
                identifier: None,
                program_id,
                class_id: None,
                cohort_year: None,
                semester: None,
            },
            active: true,
        });
        id
    }

    pub fn deactivate_user(&mut self, id: Uuid) {
        for user in self.users.iter_mut().filter(|u| u.summary.id == id) {
            user.active = false;
        }
    }

    pub fn user(&self, id: Uuid) -> Option<UserSummary> {
        self.users
            .iter()
            .find(|u| u.summary.id == id)
            .map(|u| u.summary.clone())
    }

    pub fn add_outcome(&mut self, code: &str, program_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.outcomes.push((
            LearningOutcome {
                id,
                code: code.to_string(),
            },
            program_id,
        ));
        id
    }

    pub fn add_course(&mut self, credits: i32, semester: i32, program_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.courses.push(StoredCourse {
            id,
            credits,
            semester,
            program_id,
            active: true,
        });
        id
    }

    pub fn deactivate_course(&mut self, id: Uuid) {
        for course in self.courses.iter_mut().filter(|c| c.id == id) {
            course.active = false;
        }
    }

    pub fn add_weight(&mut self, lo_id: Uuid, course_id: Uuid, weight: f64) {
        self.weights.push(CourseOutcomeWeight {
            lo_id,
            course_id,
            weight,
        });
    }

    /// Upserts on (student, outcome, course, semester).
    pub fn add_grade(
        &mut self,
        student_id: Uuid,
        lo_id: Uuid,
        course_id: Uuid,
        score: f64,
        semester: i32,
    ) {
        if let Some(existing) = self.grades.iter_mut().find(|g| {
            g.student_id == student_id
                && g.lo_id == lo_id
                && g.course_id == course_id
                && g.semester == semester
        }) {
            existing.score = score;
            return;
        }
        self.grades.push(StoredGrade {
            student_id,
            lo_id,
            course_id,
            score,
            semester,
        });
    }

    pub fn assign(&mut self, lecturer_id: Uuid, course_id: Uuid, class_id: Option<Uuid>) {
        self.assignments.push((lecturer_id, course_id, class_id));
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn faculty_of(&self, program_id: Option<Uuid>) -> Option<Uuid> {
        let id = program_id?;
        self.program_faculty.get(&id).copied()
    }

    fn course(&self, id: Uuid) -> Option<&StoredCourse> {
        self.courses.iter().find(|c| c.id == id)
    }

    fn user_matches(&self, user: &StoredUser, predicate: &UserPredicate) -> bool {
        let summary = &user.summary;
        if predicate.active_only && !user.active {
            return false;
        }
        if let Some(ids) = &predicate.ids {
            if !ids.contains(&summary.id) {
                return false;
            }
        }
        if predicate.role.is_some_and(|role| role != summary.role) {
            return false;
        }
        if differs(predicate.program_id, summary.program_id) {
            return false;
        }
        if differs(predicate.faculty_id, self.faculty_of(summary.program_id)) {
            return false;
        }
        if differs(predicate.cohort_year, summary.cohort_year) {
            return false;
        }
        if differs(predicate.class_id, summary.class_id) {
            return false;
        }
        if let Some(groups) = &predicate.groups {
            let in_group = groups.iter().any(|group| match group {
                StudentGroup::Class(class_id) => summary.class_id == Some(*class_id),
                StudentGroup::Cohort(key) => {
                    summary.program_id == Some(key.program_id)
                        && summary.semester == Some(key.semester)
                }
            });
            if !in_group {
                return false;
            }
        }
        true
    }

    fn matching_users(&self, predicate: &UserPredicate) -> Vec<UserSummary> {
        if predicate.matches_nothing() {
            return Vec::new();
        }
        let mut users: Vec<UserSummary> = self
            .users
            .iter()
            .filter(|u| self.user_matches(u, predicate))
            .map(|u| u.summary.clone())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(limit) = predicate.limit {
            users.truncate(limit);
        }
        users
    }

    fn outcome_matches(&self, program_id: Uuid, id: Uuid, predicate: &OutcomePredicate) -> bool {
        admits(&predicate.ids, id)
            && admits(&predicate.program_ids, program_id)
            && !differs(predicate.faculty_id, self.faculty_of(Some(program_id)))
    }

    fn course_matches(&self, course: &StoredCourse, predicate: &CoursePredicate) -> bool {
        course.active
            && admits(&predicate.ids, course.id)
            && admits(&predicate.program_ids, course.program_id)
            && !differs(predicate.faculty_id, self.faculty_of(Some(course.program_id)))
            && !differs(predicate.semester, Some(course.semester))
    }

    fn matching_courses(&self, predicate: &CoursePredicate) -> Vec<&StoredCourse> {
        if predicate.matches_nothing() {
            return Vec::new();
        }
        self.courses
            .iter()
            .filter(|c| self.course_matches(c, predicate))
            .collect()
    }

    fn grade_matches(
        &self,
        row: &GradeRow,
        student: &UserSummary,
        predicate: &GradePredicate,
    ) -> bool {
        if let Some(ids) = &predicate.student_ids {
            if !ids.contains(&row.student_id) {
                return false;
            }
        }
        if differs(predicate.program_id, student.program_id) {
            return false;
        }
        if differs(predicate.faculty_id, self.faculty_of(student.program_id)) {
            return false;
        }
        if differs(predicate.cohort_year, student.cohort_year) {
            return false;
        }
        if differs(predicate.class_id, student.class_id) {
            return false;
        }
        if let Some(ids) = &predicate.course_ids {
            if !ids.contains(&row.course.id) {
                return false;
            }
        }
        if let Some(sections) = &predicate.sections {
            let taught = sections.iter().any(|section| {
                section.course_id == row.course.id
                    && section.class_id.map_or(true, |id| student.class_id == Some(id))
            });
            if !taught {
                return false;
            }
        }
        predicate.semester.map_or(true, |s| s == row.semester)
    }

    fn active_students(&self) -> impl Iterator<Item = &UserSummary> + '_ {
        self.users
            .iter()
            .filter(|u| u.active && u.summary.role == Role::Student)
            .map(|u| &u.summary)
    }
}

fn differs<T: PartialEq>(wanted: Option<T>, actual: Option<T>) -> bool {
    wanted.is_some() && wanted != actual
}

fn admits(ids: &Option<Vec<Uuid>>, id: Uuid) -> bool {
    ids.as_ref().map_or(true, |ids| ids.contains(&id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_users(&self, predicate: &UserPredicate) -> StoreResult<Vec<UserSummary>> {
        self.check()?;
        Ok(self.matching_users(predicate))
    }

    async fn count_users(&self, predicate: &UserPredicate) -> StoreResult<i64> {
        self.check()?;
        Ok(self.matching_users(predicate).len() as i64)
    }

    async fn find_grade_records(&self, predicate: &GradePredicate) -> StoreResult<Vec<GradeRow>> {
        self.check()?;
        if predicate.matches_nothing() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::new();
        for grade in &self.grades {
            let Some(course) = self.course(grade.course_id) else {
                continue;
            };
            if !course.active {
                continue;
            }
            let Some(student) = self.user(grade.student_id) else {
                continue;
            };
            let row = GradeRow {
                student_id: grade.student_id,
                student_class_id: student.class_id,
                student_program_id: student.program_id,
                student_semester: student.semester,
                lo_id: grade.lo_id,
                course: CourseCredit {
                    id: course.id,
                    credits: course.credits,
                    active: course.active,
                },
                score: grade.score,
                semester: grade.semester,
            };
            if self.grade_matches(&row, &student, predicate) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn find_course_outcome_weights(
        &self,
        lo_ids: &[Uuid],
        course_ids: &[Uuid],
    ) -> StoreResult<Vec<CourseOutcomeWeight>> {
        self.check()?;
        Ok(self
            .weights
            .iter()
            .filter(|w| lo_ids.contains(&w.lo_id) && course_ids.contains(&w.course_id))
            .copied()
            .collect())
    }

    async fn find_learning_outcomes(
        &self,
        predicate: &OutcomePredicate,
    ) -> StoreResult<Vec<LearningOutcome>> {
        self.check()?;
        if predicate.matches_nothing() {
            return Ok(Vec::new());
        }
        let mut outcomes: Vec<LearningOutcome> = self
            .outcomes
            .iter()
            .filter(|(lo, program_id)| self.outcome_matches(*program_id, lo.id, predicate))
            .map(|(lo, _)| lo.clone())
            .collect();
        outcomes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(outcomes)
    }

    async fn count_learning_outcomes(&self, predicate: &OutcomePredicate) -> StoreResult<i64> {
        Ok(self.find_learning_outcomes(predicate).await?.len() as i64)
    }

    async fn count_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64> {
        self.check()?;
        Ok(self.matching_courses(predicate).len() as i64)
    }

    async fn count_unmapped_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64> {
        self.check()?;
        Ok(self
            .matching_courses(predicate)
            .into_iter()
            .filter(|c| !self.weights.iter().any(|w| w.course_id == c.id))
            .count() as i64)
    }

    async fn find_staff_assignments(
        &self,
        lecturer_ids: &[Uuid],
    ) -> StoreResult<Vec<StaffAssignment>> {
        self.check()?;
        Ok(self
            .assignments
            .iter()
            .filter(|(lecturer_id, _, _)| lecturer_ids.contains(lecturer_id))
            .filter_map(|(lecturer_id, course_id, class_id)| {
                self.course(*course_id).map(|course| StaffAssignment {
                    lecturer_id: *lecturer_id,
                    course_id: *course_id,
                    class_id: *class_id,
                    course_cohort: CohortKey {
                        program_id: course.program_id,
                        semester: course.semester,
                    },
                })
            })
            .collect())
    }

    async fn count_students_by_class(&self, class_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>> {
        self.check()?;
        let mut counts = HashMap::new();
        for student in self.active_students() {
            if let Some(class_id) = student.class_id.filter(|id| class_ids.contains(id)) {
                *counts.entry(class_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_students_by_program_semester(&self) -> StoreResult<HashMap<CohortKey, i64>> {
        self.check()?;
        let mut counts = HashMap::new();
        for student in self.active_students() {
            if let (Some(program_id), Some(semester)) = (student.program_id, student.semester) {
                let key = CohortKey {
                    program_id,
                    semester,
                };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
