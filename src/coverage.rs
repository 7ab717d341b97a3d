use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::models::{
    round1, round2, CohortKey, GradeRow, LecturerAnalysis, StaffAssignment, UserSummary,
};

/// Active enrolment counts the reconciliation divides by.
#[derive(Debug, Clone, Default)]
pub struct Rosters {
    pub by_class: HashMap<Uuid, i64>,
    pub by_cohort: HashMap<CohortKey, i64>,
}

impl Rosters {
    fn class_size(&self, class_id: Uuid) -> usize {
        self.by_class.get(&class_id).copied().unwrap_or(0).max(0) as usize
    }

    fn cohort_size(&self, cohort: CohortKey) -> usize {
        self.by_cohort.get(&cohort).copied().unwrap_or(0).max(0) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionCoverage {
    pub course_id: Uuid,
    pub graded: usize,
    pub expected: usize,
    pub score_total: f64,
    pub records: usize,
}

impl SectionCoverage {
    pub fn progress(&self) -> f64 {
        percentage(self.graded, self.expected)
    }

    /// Mean raw score of the section's records; `None` without records.
    pub fn average_score(&self) -> Option<f64> {
        if self.records == 0 {
            return None;
        }
        Some(self.score_total / self.records as f64)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

fn in_cohort(record: &GradeRow, cohort: CohortKey) -> bool {
    record.student_program_id == Some(cohort.program_id)
        && record.student_semester == Some(cohort.semester)
}

/// Expected counts never fall below the graded count, so progress stays at
/// or under 100%. A whole-cohort assignment also expects the graded students
/// from outside the cohort.
pub fn reconcile(
    assignment: &StaffAssignment,
    records: &[GradeRow],
    rosters: &Rosters,
) -> SectionCoverage {
    let section: Vec<&GradeRow> = records
        .iter()
        .filter(|r| r.course.id == assignment.course_id)
        .filter(|r| {
            assignment
                .class_id
                .map_or(true, |class_id| r.student_class_id == Some(class_id))
        })
        .collect();

    let mut graded_students: HashMap<Uuid, &GradeRow> = HashMap::new();
    for record in &section {
        graded_students.entry(record.student_id).or_insert(record);
    }
    let graded = graded_students.len();

    let nominal = match assignment.class_id {
        Some(class_id) => rosters.class_size(class_id),
        None => {
            let cohort = assignment.course_cohort;
            let extra = graded_students
                .values()
                .filter(|record| !in_cohort(record, cohort))
                .count();
            if extra > 0 {
                debug!(
                    course = %assignment.course_id,
                    extra,
                    "graded students from outside the course cohort"
                );
            }
            rosters.cohort_size(cohort) + extra
        }
    };

    let expected = if graded > nominal {
        debug!(
            lecturer = %assignment.lecturer_id,
            course = %assignment.course_id,
            class = ?assignment.class_id,
            graded,
            nominal,
            "more graded than enrolled students; raising expected count"
        );
        graded
    } else {
        nominal
    };

    SectionCoverage {
        course_id: assignment.course_id,
        graded,
        expected,
        score_total: section.iter().map(|r| r.score).sum(),
        records: section.len(),
    }
}

/// Rolls a lecturer's sections into one row. The average is taken over
/// courses with records; progress is the ratio of the totals.
pub fn summarize(lecturer: &UserSummary, sections: &[SectionCoverage]) -> LecturerAnalysis {
    if sections.is_empty() {
        return LecturerAnalysis {
            id: lecturer.id,
            name: lecturer.name.clone(),
            total_classes: 0,
            avg_score: 0.0,
            progress: 0.0,
        };
    }

    let mut by_course: HashMap<Uuid, (f64, usize)> = HashMap::new();
    for section in sections {
        let entry = by_course.entry(section.course_id).or_default();
        entry.0 += section.score_total;
        entry.1 += section.records;
    }
    let averages: Vec<f64> = by_course
        .values()
        .filter(|(_, records)| *records > 0)
        .map(|(total, records)| total / *records as f64)
        .collect();
    let avg_score = if averages.is_empty() {
        0.0
    } else {
        round2(averages.iter().sum::<f64>() / averages.len() as f64)
    };

    let graded: usize = sections.iter().map(|s| s.graded).sum();
    let expected: usize = sections.iter().map(|s| s.expected).sum();

    LecturerAnalysis {
        id: lecturer.id,
        name: lecturer.name.clone(),
        total_classes: sections.len(),
        avg_score,
        progress: percentage(graded, expected),
    }
}

/// Class sections referenced by `assignments`, without repeats.
pub fn assigned_classes(assignments: &[StaffAssignment]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    assignments
        .iter()
        .filter_map(|a| a.class_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseCredit, Role};

    fn cohort() -> CohortKey {
        CohortKey {
            program_id: Uuid::from_u128(1),
            semester: 3,
        }
    }

    fn graded(
        course_id: Uuid,
        class_id: Option<Uuid>,
        program: Uuid,
        semester: i32,
        score: f64,
    ) -> GradeRow {
        GradeRow {
            student_id: Uuid::new_v4(),
            student_class_id: class_id,
            student_program_id: Some(program),
            student_semester: Some(semester),
            lo_id: Uuid::new_v4(),
            course: CourseCredit {
                id: course_id,
                credits: 3,
                active: true,
            },
            score,
            semester,
        }
    }

    fn assignment(course_id: Uuid, class_id: Option<Uuid>) -> StaffAssignment {
        StaffAssignment {
            lecturer_id: Uuid::new_v4(),
            course_id,
            class_id,
            course_cohort: cohort(),
        }
    }

    fn section(
        course_id: Uuid,
        graded: usize,
        expected: usize,
        scores: &[f64],
    ) -> SectionCoverage {
        SectionCoverage {
            course_id,
            graded,
            expected,
            score_total: scores.iter().sum(),
            records: scores.len(),
        }
    }

    fn lecturer() -> UserSummary {
        UserSummary {
            id: Uuid::new_v4(),
            name: "Budi Santoso".to_string(),
            role: Role::Lecturer,
            identifier: None,
            program_id: None,
            class_id: None,
            cohort_year: None,
            semester: None,
        }
    }

    #[test]
    fn cohort_scope_counts_outside_students_on_both_sides() {
        let course = Uuid::new_v4();
        let program = cohort().program_id;
        let elsewhere = Uuid::from_u128(2);
        let mut records: Vec<GradeRow> = (0..25)
            .map(|_| graded(course, None, program, 3, 75.0))
            .collect();
        records.push(graded(course, None, program, 5, 60.0));
        records.push(graded(course, None, elsewhere, 3, 60.0));
        let rosters = Rosters {
            by_cohort: HashMap::from([(cohort(), 30)]),
            ..Rosters::default()
        };

        let coverage = reconcile(&assignment(course, None), &records, &rosters);
        assert_eq!(coverage.graded, 27);
        assert_eq!(coverage.expected, 32);
        assert_eq!(coverage.progress(), 84.4);
    }

    #[test]
    fn class_scope_raises_expected_to_graded() {
        let course = Uuid::new_v4();
        let class = Uuid::new_v4();
        let program = cohort().program_id;
        let records: Vec<GradeRow> = (0..12)
            .map(|_| graded(course, Some(class), program, 3, 80.0))
            .collect();
        let rosters = Rosters {
            by_class: HashMap::from([(class, 10)]),
            ..Rosters::default()
        };

        let coverage = reconcile(&assignment(course, Some(class)), &records, &rosters);
        assert_eq!(coverage.graded, 12);
        assert_eq!(coverage.expected, 12);
        assert_eq!(coverage.progress(), 100.0);
    }

    #[test]
    fn class_scope_ignores_other_sections_and_courses() {
        let course = Uuid::new_v4();
        let (class, other_class) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            graded(course, Some(class), cohort().program_id, 3, 70.0),
            graded(course, Some(other_class), cohort().program_id, 3, 40.0),
            graded(Uuid::new_v4(), Some(class), cohort().program_id, 3, 40.0),
        ];
        let rosters = Rosters {
            by_class: HashMap::from([(class, 4)]),
            ..Rosters::default()
        };

        let coverage = reconcile(&assignment(course, Some(class)), &records, &rosters);
        assert_eq!(coverage.graded, 1);
        assert_eq!(coverage.expected, 4);
        assert_eq!(coverage.average_score(), Some(70.0));
    }

    #[test]
    fn students_with_several_records_count_once() {
        let course = Uuid::new_v4();
        let first = graded(course, None, cohort().program_id, 3, 90.0);
        let mut second = graded(course, None, cohort().program_id, 3, 70.0);
        second.student_id = first.student_id;
        let rosters = Rosters {
            by_cohort: HashMap::from([(cohort(), 2)]),
            ..Rosters::default()
        };

        let coverage = reconcile(&assignment(course, None), &[first, second], &rosters);
        assert_eq!(coverage.graded, 1);
        assert_eq!(coverage.expected, 2);
        assert_eq!(coverage.average_score(), Some(80.0));
    }

    #[test]
    fn lecturer_progress_is_ratio_of_totals() {
        let sections = vec![
            section(Uuid::new_v4(), 1, 1, &[80.0]),
            section(Uuid::new_v4(), 0, 9, &[]),
        ];

        let summary = summarize(&lecturer(), &sections);
        assert_eq!(summary.total_classes, 2);
        assert_eq!(summary.progress, 10.0);
        // The ungraded course does not drag the average down.
        assert_eq!(summary.avg_score, 80.0);
    }

    #[test]
    fn sections_of_one_course_average_as_that_course() {
        let (shared, other) = (Uuid::new_v4(), Uuid::new_v4());
        let sections = vec![
            section(shared, 1, 1, &[90.0]),
            section(shared, 3, 3, &[60.0, 60.0, 60.0]),
            section(other, 1, 1, &[50.0]),
        ];

        let summary = summarize(&lecturer(), &sections);
        assert_eq!(summary.total_classes, 3);
        // Shared course: 270 / 4 = 67.5, then (67.5 + 50) / 2.
        assert_eq!(summary.avg_score, 58.75);
    }

    #[test]
    fn lecturer_without_assignments_is_all_zero() {
        let summary = summarize(&lecturer(), &[]);
        assert_eq!(summary.total_classes, 0);
        assert_eq!(summary.avg_score, 0.0);
        assert_eq!(summary.progress, 0.0);
    }

    #[test]
    fn empty_rosters_do_not_divide_by_zero() {
        let coverage = reconcile(&assignment(Uuid::new_v4(), None), &[], &Rosters::default());
        assert_eq!(coverage.expected, 0);
        assert_eq!(coverage.progress(), 0.0);
        assert_eq!(coverage.average_score(), None);
    }
}
