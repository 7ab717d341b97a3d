use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    CohortKey, CourseOutcomeWeight, GradeRow, LearningOutcome, StaffAssignment, UserSummary,
};
use crate::scope::{CoursePredicate, GradePredicate, OutcomePredicate, UserPredicate};

#[cfg(test)]
pub mod memory;

#[async_trait]
pub trait Store: Send + Sync {
    /// Users matching `predicate`, ordered by name.
    async fn find_users(&self, predicate: &UserPredicate) -> StoreResult<Vec<UserSummary>>;

    async fn count_users(&self, predicate: &UserPredicate) -> StoreResult<i64>;

    /// Grade records of active courses matching `predicate`.
    async fn find_grade_records(&self, predicate: &GradePredicate) -> StoreResult<Vec<GradeRow>>;

    /// Weight rows for any pair drawn from `lo_ids` x `course_ids`.
    async fn find_course_outcome_weights(
        &self,
        lo_ids: &[Uuid],
        course_ids: &[Uuid],
    ) -> StoreResult<Vec<CourseOutcomeWeight>>;

    async fn find_learning_outcomes(
        &self,
        predicate: &OutcomePredicate,
    ) -> StoreResult<Vec<LearningOutcome>>;

    async fn count_learning_outcomes(&self, predicate: &OutcomePredicate) -> StoreResult<i64>;

    async fn count_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64>;

    /// Courses in scope with no outcome weight row at all.
    async fn count_unmapped_courses(&self, predicate: &CoursePredicate) -> StoreResult<i64>;

    /// Teaching assignments of every lecturer in `lecturer_ids`, in one batch.
    async fn find_staff_assignments(
        &self,
        lecturer_ids: &[Uuid],
    ) -> StoreResult<Vec<StaffAssignment>>;

    /// Active students per class section.
    async fn count_students_by_class(&self, class_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, i64>>;

    /// Active students per program and current semester.
    async fn count_students_by_program_semester(&self) -> StoreResult<HashMap<CohortKey, i64>>;
}
