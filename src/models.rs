use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    ProgramHead,
    Lecturer,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProgramHead => "program-head",
            Role::Lecturer => "lecturer",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "program-head" => Ok(Role::ProgramHead),
            "lecturer" => Ok(Role::Lecturer),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The authenticated identity a dashboard request runs as.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
    pub program_id: Option<Uuid>,
}

impl Caller {
    pub fn from_user(user: &UserSummary) -> Self {
        Self {
            id: user.id,
            role: user.role,
            program_id: user.program_id,
        }
    }
}

/// Request-side filter selections. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub semester: Option<i32>,
    pub cohort_year: Option<i32>,
    pub class_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub faculty_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// Student number for students, staff number for lecturers.
    pub identifier: Option<String>,
    pub program_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub cohort_year: Option<i32>,
    pub semester: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearningOutcome {
    pub id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseOutcomeWeight {
    pub lo_id: Uuid,
    pub course_id: Uuid,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseCredit {
    pub id: Uuid,
    pub credits: i32,
    pub active: bool,
}

/// One grade record joined with its course and the graded student's placement.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRow {
    pub student_id: Uuid,
    pub student_class_id: Option<Uuid>,
    pub student_program_id: Option<Uuid>,
    pub student_semester: Option<i32>,
    pub lo_id: Uuid,
    pub course: CourseCredit,
    pub score: f64,
    pub semester: i32,
}

/// Program and semester a course is normally taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CohortKey {
    pub program_id: Uuid,
    pub semester: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffAssignment {
    pub lecturer_id: Uuid,
    pub course_id: Uuid,
    pub class_id: Option<Uuid>,
    pub course_cohort: CohortKey,
}

// Presentation-facing response shapes.

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeScore {
    #[serde(skip)]
    pub lo_id: Uuid,
    pub code: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub semester: i32,
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBand {
    pub name: &'static str,
    pub count: usize,
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub code: String,
    pub score: f64,
    pub status: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Danger,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightKind {
    Strongest,
    Weakest,
    Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineStats {
    pub users: i64,
    pub lo: i64,
    pub courses: i64,
    pub records: usize,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub total_courses: i64,
    pub mapped_courses: i64,
    pub mapping_percentage: f64,
    pub total_students: i64,
    pub graded_students: usize,
    pub grading_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub stats: HeadlineStats,
    pub completeness: Completeness,
    pub chart_data: Vec<OutcomeScore>,
    pub trend_data: Vec<TrendPoint>,
    pub distribution_data: Vec<DistributionBand>,
    pub performance_data: Vec<PerformanceEntry>,
    pub alerts: Vec<Alert>,
    pub insights: Vec<Insight>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerAnalysis {
    pub id: Uuid,
    pub name: String,
    pub total_classes: usize,
    pub avg_score: f64,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowOutcome {
    pub code: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    pub id: Uuid,
    pub name: String,
    pub student_number: Option<String>,
    #[serde(rename = "avgLO")]
    pub avg_lo: f64,
    pub low_lo_count: usize,
    pub low_lo_details: Vec<LowOutcome>,
}

/// Rounds to two decimals, the precision every score is reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
