use tracing::debug;
use uuid::Uuid;

use crate::models::{Caller, CohortKey, Filters, Role, StaffAssignment};

/// A population of students a lecturer is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudentGroup {
    Class(Uuid),
    Cohort(CohortKey),
}

/// One taught course, optionally restricted to a class section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Section {
    pub course_id: Uuid,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPredicate {
    pub empty: bool,
    pub ids: Option<Vec<Uuid>>,
    pub role: Option<Role>,
    pub program_id: Option<Uuid>,
    pub faculty_id: Option<Uuid>,
    pub cohort_year: Option<i32>,
    pub class_id: Option<Uuid>,
    /// Any-of: class members, or active students of a program semester.
    pub groups: Option<Vec<StudentGroup>>,
    pub active_only: bool,
    pub limit: Option<usize>,
}

impl UserPredicate {
    pub fn nothing() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn by_ids(ids: &[Uuid]) -> Self {
        Self {
            ids: Some(ids.to_vec()),
            ..Self::default()
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.empty
            || self.ids.as_ref().is_some_and(Vec::is_empty)
            || self.groups.as_ref().is_some_and(Vec::is_empty)
            || self.limit == Some(0)
    }

    /// Active students within this population.
    pub fn students(&self) -> Self {
        let mut predicate = self.clone();
        if predicate.role.is_some_and(|role| role != Role::Student) {
            predicate.empty = true;
        }
        predicate.role = Some(Role::Student);
        predicate.active_only = true;
        predicate
    }

    pub fn with_limit(self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomePredicate {
    pub empty: bool,
    pub ids: Option<Vec<Uuid>>,
    pub program_ids: Option<Vec<Uuid>>,
    pub faculty_id: Option<Uuid>,
}

impl OutcomePredicate {
    pub fn nothing() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn by_ids(ids: &[Uuid]) -> Self {
        Self {
            ids: Some(ids.to_vec()),
            ..Self::default()
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.empty
            || self.ids.as_ref().is_some_and(Vec::is_empty)
            || self.program_ids.as_ref().is_some_and(Vec::is_empty)
    }
}

/// Courses in scope. Only active courses ever match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoursePredicate {
    pub empty: bool,
    pub ids: Option<Vec<Uuid>>,
    pub program_ids: Option<Vec<Uuid>>,
    pub faculty_id: Option<Uuid>,
    pub semester: Option<i32>,
}

impl CoursePredicate {
    pub fn nothing() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.empty
            || self.ids.as_ref().is_some_and(Vec::is_empty)
            || self.program_ids.as_ref().is_some_and(Vec::is_empty)
    }
}

/// Grade records in scope. Student fields test the graded student's profile;
/// records of inactive courses never match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradePredicate {
    pub empty: bool,
    pub student_ids: Option<Vec<Uuid>>,
    pub program_id: Option<Uuid>,
    pub faculty_id: Option<Uuid>,
    pub cohort_year: Option<i32>,
    pub class_id: Option<Uuid>,
    pub course_ids: Option<Vec<Uuid>>,
    pub sections: Option<Vec<Section>>,
    pub semester: Option<i32>,
}

impl GradePredicate {
    pub fn nothing() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.empty
            || self.student_ids.as_ref().is_some_and(Vec::is_empty)
            || self.course_ids.as_ref().is_some_and(Vec::is_empty)
            || self.sections.as_ref().is_some_and(Vec::is_empty)
    }

    pub fn with_students(&self, ids: &[Uuid]) -> Self {
        Self {
            student_ids: Some(narrow(self.student_ids.as_deref(), ids)),
            ..self.clone()
        }
    }

    pub fn with_courses(&self, ids: &[Uuid]) -> Self {
        Self {
            course_ids: Some(narrow(self.course_ids.as_deref(), ids)),
            ..self.clone()
        }
    }

    /// The part of `assignment` this predicate can see, if any. A
    /// whole-cohort assignment under a class filter narrows to that class.
    pub fn restrict_assignment(&self, assignment: &StaffAssignment) -> Option<StaffAssignment> {
        if self.matches_nothing() {
            return None;
        }
        if let Some(ids) = &self.course_ids {
            if !ids.contains(&assignment.course_id) {
                return None;
            }
        }
        if let Some(sections) = &self.sections {
            let section = Section {
                course_id: assignment.course_id,
                class_id: assignment.class_id,
            };
            if !sections.contains(&section) {
                return None;
            }
        }
        let cohort = assignment.course_cohort;
        if self.semester.is_some_and(|s| s != cohort.semester) {
            return None;
        }
        if self.program_id.is_some_and(|p| p != cohort.program_id) {
            return None;
        }

        let class_id = match (self.class_id, assignment.class_id) {
            (Some(wanted), Some(taught)) if wanted != taught => return None,
            (Some(wanted), _) => Some(wanted),
            (None, taught) => taught,
        };
        Some(StaffAssignment {
            class_id,
            ..*assignment
        })
    }
}

/// Intersects an optional id restriction with `ids`, keeping `ids` order.
fn narrow(current: Option<&[Uuid]>, ids: &[Uuid]) -> Vec<Uuid> {
    let mut narrowed: Vec<Uuid> = match current {
        Some(current) => ids.iter().copied().filter(|id| current.contains(id)).collect(),
        None => ids.to_vec(),
    };
    dedup_in_order(&mut narrowed);
    narrowed
}

fn dedup_in_order<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut seen: Vec<T> = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(*item);
            true
        }
    });
}

/// Everything a dashboard request is allowed to see, resolved once. Narrowing
/// that cannot be satisfied yields predicates that match nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterScope {
    pub role: Role,
    pub users: UserPredicate,
    pub outcomes: OutcomePredicate,
    pub courses: CoursePredicate,
    pub grades: GradePredicate,
    /// Staff whose teaching load the lecturer analysis reports on.
    pub lecturers: UserPredicate,
}

impl FilterScope {
    /// `assignments` are the caller's own teaching assignments; they are only
    /// consulted for lecturers.
    pub fn resolve(caller: &Caller, filters: &Filters, assignments: &[StaffAssignment]) -> Self {
        match caller.role {
            Role::Admin => Self::institution(caller.role, filters),
            Role::ProgramHead => match caller.program_id {
                Some(program_id) => {
                    let forced = Filters {
                        program_id: Some(program_id),
                        ..filters.clone()
                    };
                    Self::institution(caller.role, &forced)
                }
                None => {
                    debug!(caller = %caller.id, "program head has no program on record");
                    Self::nothing(caller.role)
                }
            },
            Role::Lecturer => Self::teaching(caller, filters, assignments),
            Role::Student => Self::own_record(caller, filters),
        }
    }

    pub fn nothing(role: Role) -> Self {
        Self {
            role,
            users: UserPredicate::nothing(),
            outcomes: OutcomePredicate::nothing(),
            courses: CoursePredicate::nothing(),
            grades: GradePredicate::nothing(),
            lecturers: UserPredicate::nothing(),
        }
    }

    fn institution(role: Role, filters: &Filters) -> Self {
        let program_ids = filters.program_id.map(|id| vec![id]);
        let course_ids = filters.course_id.map(|id| vec![id]);

        Self {
            role,
            users: UserPredicate {
                program_id: filters.program_id,
                faculty_id: filters.faculty_id,
                cohort_year: filters.cohort_year,
                class_id: filters.class_id,
                ..UserPredicate::default()
            },
            outcomes: OutcomePredicate {
                program_ids: program_ids.clone(),
                faculty_id: filters.faculty_id,
                ..OutcomePredicate::default()
            },
            courses: CoursePredicate {
                ids: course_ids.clone(),
                program_ids,
                faculty_id: filters.faculty_id,
                semester: filters.semester,
                ..CoursePredicate::default()
            },
            grades: GradePredicate {
                program_id: filters.program_id,
                faculty_id: filters.faculty_id,
                cohort_year: filters.cohort_year,
                class_id: filters.class_id,
                course_ids,
                semester: filters.semester,
                ..GradePredicate::default()
            },
            lecturers: UserPredicate {
                role: Some(Role::Lecturer),
                program_id: filters.program_id,
                faculty_id: filters.faculty_id,
                ..UserPredicate::default()
            },
        }
    }

    fn teaching(caller: &Caller, filters: &Filters, assignments: &[StaffAssignment]) -> Self {
        let sections: Vec<&StaffAssignment> = assignments
            .iter()
            .filter(|a| a.lecturer_id == caller.id)
            .filter(|a| filters.course_id.map_or(true, |id| id == a.course_id))
            .collect();

        if sections.is_empty() {
            debug!(
                lecturer = %caller.id,
                course = ?filters.course_id,
                "no teaching sections match the requested scope"
            );
            return Self::nothing(caller.role);
        }

        let mut course_ids: Vec<Uuid> = sections.iter().map(|a| a.course_id).collect();
        dedup_in_order(&mut course_ids);

        let mut program_ids: Vec<Uuid> = sections
            .iter()
            .map(|a| a.course_cohort.program_id)
            .collect();
        dedup_in_order(&mut program_ids);
        if let Some(requested) = filters.program_id {
            program_ids = narrow(Some(&program_ids), &[requested]);
        }

        let mut groups: Vec<StudentGroup> = sections
            .iter()
            .map(|a| match a.class_id {
                Some(class_id) => StudentGroup::Class(class_id),
                None => StudentGroup::Cohort(a.course_cohort),
            })
            .collect();
        dedup_in_order(&mut groups);

        let mut grade_sections: Vec<Section> = sections
            .iter()
            .map(|a| Section {
                course_id: a.course_id,
                class_id: a.class_id,
            })
            .collect();
        dedup_in_order(&mut grade_sections);

        Self {
            role: caller.role,
            users: UserPredicate {
                role: Some(Role::Student),
                program_id: filters.program_id,
                faculty_id: filters.faculty_id,
                cohort_year: filters.cohort_year,
                class_id: filters.class_id,
                groups: Some(groups),
                ..UserPredicate::default()
            },
            outcomes: OutcomePredicate {
                program_ids: Some(program_ids),
                faculty_id: filters.faculty_id,
                ..OutcomePredicate::default()
            },
            courses: CoursePredicate {
                ids: Some(course_ids),
                program_ids: filters.program_id.map(|id| vec![id]),
                faculty_id: filters.faculty_id,
                semester: filters.semester,
                ..CoursePredicate::default()
            },
            grades: GradePredicate {
                program_id: filters.program_id,
                faculty_id: filters.faculty_id,
                cohort_year: filters.cohort_year,
                class_id: filters.class_id,
                sections: Some(grade_sections),
                semester: filters.semester,
                ..GradePredicate::default()
            },
            lecturers: UserPredicate {
                ids: Some(vec![caller.id]),
                role: Some(Role::Lecturer),
                ..UserPredicate::default()
            },
        }
    }

    /// Students only ever see themselves; class, cohort, program and faculty
    /// selections are dropped.
    fn own_record(caller: &Caller, filters: &Filters) -> Self {
        let program_ids: Vec<Uuid> = caller.program_id.into_iter().collect();
        let course_ids = filters.course_id.map(|id| vec![id]);

        Self {
            role: caller.role,
            users: UserPredicate::by_ids(&[caller.id]),
            outcomes: OutcomePredicate {
                program_ids: Some(program_ids.clone()),
                ..OutcomePredicate::default()
            },
            courses: CoursePredicate {
                ids: course_ids.clone(),
                program_ids: Some(program_ids),
                semester: filters.semester,
                ..CoursePredicate::default()
            },
            grades: GradePredicate {
                student_ids: Some(vec![caller.id]),
                course_ids,
                semester: filters.semester,
                ..GradePredicate::default()
            },
            lecturers: UserPredicate::nothing(),
        }
    }
}
