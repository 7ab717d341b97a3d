use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreResult;

const FACULTY: Uuid = Uuid::from_u128(0x1001);
const PROGRAM: Uuid = Uuid::from_u128(0x2001);
const CLASS_A: Uuid = Uuid::from_u128(0x3001);
const CLASS_B: Uuid = Uuid::from_u128(0x3002);

const LO_1: Uuid = Uuid::from_u128(0x6001);
const LO_2: Uuid = Uuid::from_u128(0x6002);
const LO_3: Uuid = Uuid::from_u128(0x6003);

const DATA_STRUCTURES: Uuid = Uuid::from_u128(0x7001);
const DATABASES: Uuid = Uuid::from_u128(0x7002);
const DISCRETE_MATH: Uuid = Uuid::from_u128(0x7003);
const INTRO_PROGRAMMING: Uuid = Uuid::from_u128(0x7004);
const LEGACY_COURSE: Uuid = Uuid::from_u128(0x7005);

const LECTURER_SARI: Uuid = Uuid::from_u128(0x4003);
const LECTURER_AGUS: Uuid = Uuid::from_u128(0x4004);

/// Loads a small demo institution. Every insert is an upsert.
pub async fn load(pool: &PgPool) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO outcomes.faculties (id, name) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
    )
    .bind(FACULTY)
    .bind("Faculty of Engineering")
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO outcomes.programs (id, faculty_id, code, name) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
    )
    .bind(PROGRAM)
    .bind(FACULTY)
    .bind("IF")
    .bind("Informatics")
    .execute(pool)
    .await?;

    for (id, name) in [(CLASS_A, "IF-A"), (CLASS_B, "IF-B")] {
        sqlx::query(
            "INSERT INTO outcomes.classes (id, program_id, cohort_year, name) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(id)
        .bind(PROGRAM)
        .bind(2024)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let staff = vec![
        (
            Uuid::from_u128(0x4001),
            "Rina Kusuma",
            "admin",
            "STAFF-001",
            None,
        ),
        (
            Uuid::from_u128(0x4002),
            "Hendra Wijaya",
            "program-head",
            "STAFF-002",
            Some(PROGRAM),
        ),
        (
            LECTURER_SARI,
            "Sari Utami",
            "lecturer",
            "STAFF-003",
            Some(PROGRAM),
        ),
        (
            LECTURER_AGUS,
            "Agus Pratama",
            "lecturer",
            "STAFF-004",
            Some(PROGRAM),
        ),
    ];
    for (id, name, role, identifier, program_id) in staff {
        upsert_user(
            pool,
            id,
            name,
            role,
            identifier,
            program_id,
            None,
            None,
            None,
        )
        .await?;
    }

    let students = vec![
        ("Ayu Lestari", Some(CLASS_A), 2024, 3),
        ("Bayu Saputra", Some(CLASS_A), 2024, 3),
        ("Citra Dewi", Some(CLASS_A), 2024, 3),
        ("Dimas Nugroho", Some(CLASS_A), 2024, 3),
        ("Eka Putri", Some(CLASS_B), 2024, 3),
        ("Fajar Hidayat", Some(CLASS_B), 2024, 3),
        ("Gita Permata", Some(CLASS_B), 2024, 3),
        // Retaking third-semester courses from an older cohort.
        ("Hadi Firmansyah", None, 2023, 5),
    ];
    let mut student_ids = Vec::with_capacity(students.len());
    for (index, (name, class_id, cohort_year, semester)) in students.into_iter().enumerate() {
        let id = Uuid::from_u128(0x5001 + index as u128);
        let identifier = format!("{cohort_year}{:04}", index + 1);
        upsert_user(
            pool,
            id,
            name,
            "student",
            &identifier,
            Some(PROGRAM),
            class_id,
            Some(cohort_year),
            Some(semester),
        )
        .await?;
        student_ids.push(id);
    }

    for (id, code) in [(LO_1, "LO-01"), (LO_2, "LO-02"), (LO_3, "LO-03")] {
        sqlx::query(
            "INSERT INTO outcomes.learning_outcomes (id, program_id, code) \
             VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(PROGRAM)
        .bind(code)
        .execute(pool)
        .await?;
    }

    let courses = vec![
        (DATA_STRUCTURES, "IF201", "Data Structures", 3, 3, true),
        (DATABASES, "IF202", "Databases", 2, 3, true),
        (DISCRETE_MATH, "IF203", "Discrete Mathematics", 3, 3, true),
        (INTRO_PROGRAMMING, "IF102", "Programming I", 3, 2, true),
        (LEGACY_COURSE, "IF100", "Computer Literacy", 2, 1, false),
    ];
    for (id, code, name, credits, semester, active) in courses {
        sqlx::query(
            "INSERT INTO outcomes.courses \
             (id, program_id, code, name, credits, semester, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE \
             SET credits = EXCLUDED.credits, is_active = EXCLUDED.is_active",
        )
        .bind(id)
        .bind(PROGRAM)
        .bind(code)
        .bind(name)
        .bind(credits)
        .bind(semester)
        .bind(active)
        .execute(pool)
        .await?;
    }

    // Discrete Mathematics is deliberately left without weights.
    let weights = vec![
        (LO_1, DATA_STRUCTURES, 2.0),
        (LO_2, DATA_STRUCTURES, 1.0),
        (LO_2, DATABASES, 1.5),
        (LO_3, DATABASES, 1.0),
        (LO_1, INTRO_PROGRAMMING, 1.0),
        (LO_3, LEGACY_COURSE, 1.0),
    ];
    for (lo_id, course_id, weight) in &weights {
        sqlx::query(
            "INSERT INTO outcomes.course_outcome_weights (lo_id, course_id, weight) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (lo_id, course_id) DO UPDATE SET weight = EXCLUDED.weight",
        )
        .bind(lo_id)
        .bind(course_id)
        .bind(weight)
        .execute(pool)
        .await?;
    }

    for (index, student_id) in student_ids.iter().enumerate() {
        for (pair, (lo_id, course_id, _)) in weights.iter().enumerate() {
            // Gita has not been graded in Databases yet.
            if index == 6 && *course_id == DATABASES {
                continue;
            }
            let (semester, academic_year) = match *course_id {
                INTRO_PROGRAMMING => (2, "2024/2025"),
                LEGACY_COURSE => (1, "2024/2025"),
                _ => (3, "2025/2026"),
            };
            let score = 38.0 + ((index * 23 + pair * 17) % 60) as f64;
            upsert_grade(
                pool,
                *student_id,
                *lo_id,
                *course_id,
                score,
                semester,
                academic_year,
            )
            .await?;
        }
    }

    let assignments = vec![
        (LECTURER_SARI, DATA_STRUCTURES, Some(CLASS_A)),
        (LECTURER_SARI, DATA_STRUCTURES, Some(CLASS_B)),
        (LECTURER_AGUS, DATABASES, None),
        (LECTURER_AGUS, DISCRETE_MATH, Some(CLASS_A)),
    ];
    for (index, (lecturer_id, course_id, class_id)) in assignments.into_iter().enumerate() {
        sqlx::query(
            "INSERT INTO outcomes.staff_assignments (id, lecturer_id, course_id, class_id) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::from_u128(0x8001 + index as u128))
        .bind(lecturer_id)
        .bind(course_id)
        .bind(class_id)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn upsert_user(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    role: &str,
    identifier: &str,
    program_id: Option<Uuid>,
    class_id: Option<Uuid>,
    cohort_year: Option<i32>,
    semester: Option<i32>,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO outcomes.users \
         (id, full_name, role, identifier, program_id, class_id, cohort_year, semester) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name, role = EXCLUDED.role, \
         program_id = EXCLUDED.program_id, class_id = EXCLUDED.class_id, \
         cohort_year = EXCLUDED.cohort_year, semester = EXCLUDED.semester",
    )
    .bind(id)
    .bind(name)
    .bind(role)
    .bind(identifier)
    .bind(program_id)
    .bind(class_id)
    .bind(cohort_year)
    .bind(semester)
    .execute(pool)
    .await?;
    Ok(())
}

/// One logical record per (student, outcome, course, semester, academic year).
async fn upsert_grade(
    pool: &PgPool,
    student_id: Uuid,
    lo_id: Uuid,
    course_id: Uuid,
    score: f64,
    semester: i32,
    academic_year: &str,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO outcomes.grade_records \
         (id, student_id, lo_id, course_id, score, semester, academic_year) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (student_id, lo_id, course_id, semester, academic_year) \
         DO UPDATE SET score = EXCLUDED.score",
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(lo_id)
    .bind(course_id)
    .bind(score)
    .bind(semester)
    .bind(academic_year)
    .execute(pool)
    .await?;
    Ok(())
}
