use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter, types::Value as SqlValue};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use awarenow_api::campaign::RecipientFlags;
use awarenow_api::db::{self, Built};
use awarenow_api::progress::CourseProgress;
use awarenow_api::score::{ProfileStats, awareness_score};
use awarenow_api::{
    AssignmentResponse, AssignmentStatus, CampaignResponse, CampaignStatus, CategoryResponse,
    CertificateResponse, CompanyResponse, CompanyStatus, CourseResponse, CourseVisibility,
    GroupResponse, PlanResponse, ProfileResponse, QuestionResponse, QuestionType, QuizResponse,
    Role, TemplateResponse, UserResponse,
};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Lock the connection. Do not hold the guard across an `.await`.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("awarenow.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    configure(conn)
}

/// Private in-memory database with the full schema.
#[cfg(test)]
pub fn open_in_memory() -> Result<Db> {
    configure(Connection::open_in_memory()?)
}

fn configure(conn: Connection) -> Result<Db> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for &(name, sql) in db::migrations::MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query → rusqlite binding
// ---------------------------------------------------------------------------

fn bind_values(values: &sea_query::Values) -> Vec<SqlValue> {
    values
        .0
        .iter()
        .map(|v| match v {
            sea_query::Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
            sea_query::Value::TinyInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::SmallInt(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::BigInt(Some(i)) => SqlValue::Integer(*i),
            sea_query::Value::TinyUnsigned(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::SmallUnsigned(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::Unsigned(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::BigUnsigned(Some(i)) => {
                SqlValue::Integer(i64::try_from(*i).unwrap_or(i64::MAX))
            }
            sea_query::Value::Float(Some(f)) => SqlValue::Real(f64::from(*f)),
            sea_query::Value::Double(Some(f)) => SqlValue::Real(*f),
            sea_query::Value::String(Some(s)) => SqlValue::Text(s.as_ref().clone()),
            sea_query::Value::Char(Some(c)) => SqlValue::Text(c.to_string()),
            sea_query::Value::Bytes(Some(b)) => SqlValue::Blob(b.as_ref().clone()),
            _ => SqlValue::Null,
        })
        .collect()
}

/// Execute a built statement, returning the number of affected rows.
pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, params_from_iter(bind_values(&values)))
}

/// Query exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(&sql, params_from_iter(bind_values(&values)), f)
}

/// Query at most one row.
pub fn sq_query_opt<T, F>(
    conn: &Connection,
    built: Built,
    f: F,
) -> rusqlite::Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    sq_query_row(conn, built, f).optional()
}

/// Query all rows.
pub fn sq_query_map<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values(&values)), f)?
        .collect::<rusqlite::Result<Vec<T>>>();
    rows
}

/// Whether an error is a UNIQUE / constraint violation.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row mappers (column order documented on the matching builders)
// ---------------------------------------------------------------------------

fn parse_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value {raw:?}").into(),
        )
    })
}

pub fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<PlanResponse> {
    Ok(PlanResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        max_users: row.get(2)?,
        price: row.get(3)?,
        has_platform_support: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn company_from_row(row: &Row<'_>) -> rusqlite::Result<CompanyResponse> {
    Ok(CompanyResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        email_domain: row.get(2)?,
        subscription_plan_id: row.get(3)?,
        license_start_date: row.get(4)?,
        license_end_date: row.get(5)?,
        status: parse_col(row, 6, CompanyStatus::parse)?,
        created_at: row.get(7)?,
    })
}

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserResponse> {
    Ok(UserResponse {
        id: row.get(0)?,
        company_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: parse_col(row, 5, Role::parse)?,
        department: row.get(6)?,
        job_title: row.get(7)?,
        is_active: row.get(8)?,
        is_disabled: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupResponse> {
    Ok(GroupResponse {
        id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_system: row.get(4)?,
        member_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryResponse> {
    Ok(CategoryResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        color: row.get(4)?,
        course_count: row.get(5)?,
    })
}

pub fn course_from_row(row: &Row<'_>) -> rusqlite::Result<CourseResponse> {
    Ok(CourseResponse {
        id: row.get(0)?,
        title: row.get(1)?,
        brief_description: row.get(2)?,
        category_id: row.get(3)?,
        thumbnail_url: row.get(4)?,
        video_url: row.get(5)?,
        video_duration_minutes: row.get(6)?,
        visibility: parse_col(row, 7, CourseVisibility::parse)?,
        points_reward: row.get(8)?,
        is_published: row.get(9)?,
        published_at: row.get(10)?,
        created_by: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Quiz settings; questions are loaded separately.
pub fn quiz_from_row(row: &Row<'_>) -> rusqlite::Result<QuizResponse> {
    Ok(QuizResponse {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        passing_score: row.get(4)?,
        time_limit_minutes: row.get(5)?,
        max_attempts: row.get(6)?,
        questions: Vec::new(),
    })
}

/// A question with its answer key and explanation.
pub fn question_from_row(row: &Row<'_>) -> rusqlite::Result<QuestionResponse> {
    Ok(QuestionResponse {
        id: row.get(0)?,
        question_text: row.get(1)?,
        question_type: parse_col(row, 2, QuestionType::parse)?,
        option_a: row.get(3)?,
        option_b: row.get(4)?,
        option_c: row.get(5)?,
        option_d: row.get(6)?,
        correct_answers: row.get(7)?,
        points: row.get(8)?,
        explanation: row.get(9)?,
        sort_order: row.get(10)?,
    })
}

pub fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<AssignmentResponse> {
    Ok(AssignmentResponse {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        course_id: row.get(2)?,
        course_title: row.get(3)?,
        status: parse_col(row, 4, AssignmentStatus::parse)?,
        progress_percentage: row.get(5)?,
        due_date: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
        assigned_at: row.get(9)?,
        is_overdue: false,
        progress: None,
    })
}

pub fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<CourseProgress> {
    Ok(CourseProgress {
        video_total_seconds: row.get(0)?,
        video_watched_seconds: row.get(1)?,
        total_time_spent: row.get(2)?,
        required_watch_percentage: row.get(3)?,
        required_quiz_score: row.get(4)?,
        quiz_attempts: row.get(5)?,
        best_quiz_score: row.get(6)?,
        passed_quiz: row.get(7)?,
    })
}

pub fn certificate_from_row(row: &Row<'_>) -> rusqlite::Result<CertificateResponse> {
    Ok(CertificateResponse {
        certificate_id: row.get(0)?,
        employee_id: row.get(1)?,
        course_id: row.get(2)?,
        course_title: row.get(3)?,
        assignment_id: row.get(4)?,
        verification_token: row.get(5)?,
        issued_at: row.get(6)?,
    })
}

pub fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileResponse> {
    Ok(ProfileResponse {
        user_id: row.get(0)?,
        employee_id: row.get(1)?,
        completed_courses_count: row.get(2)?,
        average_quiz_score: row.get(3)?,
        phishing_tests_taken: row.get(4)?,
        phishing_tests_passed: row.get(5)?,
        awareness_score: row.get(6)?,
    })
}

pub fn template_from_row(row: &Row<'_>) -> rusqlite::Result<TemplateResponse> {
    Ok(TemplateResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        subject: row.get(2)?,
        preview_image_url: row.get(3)?,
        html_content: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignResponse> {
    Ok(CampaignResponse {
        id: row.get(0)?,
        company_id: row.get(1)?,
        title: row.get(2)?,
        group_id: row.get(3)?,
        group_name: row.get(4)?,
        sender: row.get(5)?,
        scheduled_date: row.get(6)?,
        status: parse_col(row, 7, CampaignStatus::parse)?,
        template_id: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        published_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

/// One row of [`db::campaigns::recipients`].
pub struct RecipientRow {
    pub id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub token: String,
    pub sent_at: Option<String>,
    pub flags: RecipientFlags,
}

pub fn recipient_from_row(row: &Row<'_>) -> rusqlite::Result<RecipientRow> {
    Ok(RecipientRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        token: row.get(5)?,
        sent_at: row.get(6)?,
        flags: RecipientFlags {
            opened_at: row.get(7)?,
            clicked_at: row.get(8)?,
            fallen_at: row.get(9)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Derived data
// ---------------------------------------------------------------------------

/// Recompute an employee's course statistics and awareness score from the
/// stored assignments, attempts, and phishing counters.
pub fn refresh_employee_profile(conn: &Connection, user_id: &str) -> rusqlite::Result<ProfileResponse> {
    sq_execute(conn, db::learning::profile_insert(user_id))?;

    let (completed, average): (i64, Option<f64>) =
        sq_query_row(conn, db::learning::course_stats(user_id), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
    let profile = sq_query_row(conn, db::learning::profile_get(user_id), profile_from_row)?;

    let stats = ProfileStats {
        completed_courses: completed,
        average_quiz_score: average,
        phishing_tests_taken: profile.phishing_tests_taken,
        phishing_tests_passed: profile.phishing_tests_passed,
    };
    let score = awareness_score(&stats);
    let average = average.map(awarenow_api::score::round1).unwrap_or(0.0);
    sq_execute(
        conn,
        db::learning::profile_update_scores(user_id, completed, average, score),
    )?;

    Ok(ProfileResponse {
        completed_courses_count: completed,
        average_quiz_score: average,
        awareness_score: score,
        ..profile
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        init_db(dir.path()).unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, db::migrations::MIGRATIONS.len() as i64);
    }

    #[test]
    fn built_statements_bind_through_rusqlite() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        sq_execute(&conn, db::companies::plan_insert("p1", "Starter", 25, 9.5, true)).unwrap();
        let plan = sq_query_row(&conn, db::companies::plan_get("p1"), plan_from_row).unwrap();
        assert_eq!(plan.name, "Starter");
        assert_eq!(plan.max_users, 25);
        assert!(plan.has_platform_support);
        assert!(
            sq_query_opt(&conn, db::companies::plan_get("missing"), plan_from_row)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn duplicate_active_email_in_company_is_rejected() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO companies (id, name, email_domain) VALUES ('co', 'Contoso', 'contoso.com');
             INSERT INTO users (id, company_id, email, role) VALUES ('u1', 'co', 'a@contoso.com', 'EMPLOYEE');",
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (id, company_id, email, role) VALUES ('u2', 'co', 'a@contoso.com', 'EMPLOYEE')",
                [],
            )
            .unwrap_err();
        assert!(is_constraint_violation(&err));

        // A disabled account frees the address.
        conn.execute("UPDATE users SET is_disabled = 1 WHERE id = 'u1'", [])
            .unwrap();
        conn.execute(
            "INSERT INTO users (id, company_id, email, role) VALUES ('u2', 'co', 'a@contoso.com', 'EMPLOYEE')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn profile_refresh_combines_courses_and_phishing() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        conn.execute_batch(
            "INSERT INTO companies (id, name, email_domain) VALUES ('co', 'Contoso', 'contoso.com');
             INSERT INTO users (id, company_id, email, role) VALUES ('e1', 'co', 'e@contoso.com', 'EMPLOYEE');
             INSERT INTO employee_profiles (user_id, phishing_tests_taken, phishing_tests_passed)
                 VALUES ('e1', 5, 4);",
        )
        .unwrap();

        let profile = refresh_employee_profile(&conn, "e1").unwrap();
        assert_eq!(profile.completed_courses_count, 0);
        // Only the phishing component has data: 4/5 passed.
        assert_eq!(profile.awareness_score, 80.0);

        let stored: f64 = conn
            .query_row(
                "SELECT awareness_score FROM employee_profiles WHERE user_id = 'e1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, 80.0);
    }
}
