//! Employee assignments, progress, quiz attempts, certificates, and profiles.

use sea_query::{Alias, Asterisk, Expr, Func, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::tables::{
    CourseCertificates, Courses, EmployeeCourseAssignments, EmployeeCourseProgress,
    EmployeeProfiles, QuizAttempts, Users,
};
use super::{Built, now_expr, opt_str};
use crate::progress::CourseProgress;
use crate::{AssignmentStatus, Role};

// ── Assignments ────────────────────────────────────────────────────────────

/// Column order: id, employee_id, course_id, course_title, status,
/// progress_percentage, due_date, started_at, completed_at, assigned_at.
pub fn assignment_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Id))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::EmployeeId))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CourseId))
        .column((Courses::Table, Courses::Title))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::ProgressPercentage))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::DueDate))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::StartedAt))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CompletedAt))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CreatedAt))
}

fn from_assignments(q: &mut SelectStatement) -> &mut SelectStatement {
    q.from(EmployeeCourseAssignments::Table).inner_join(
        Courses::Table,
        Expr::col((Courses::Table, Courses::Id))
            .equals((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CourseId)),
    )
}

/// Values of a new employee assignment.
pub struct NewAssignment<'a> {
    pub id: &'a str,
    pub employee_id: &'a str,
    pub course_id: &'a str,
    pub company_assignment_id: &'a str,
    pub assigned_by: &'a str,
    pub due_date: Option<&'a str>,
}

/// Assign a course to an employee. An existing (employee, course) pair is
/// left alone; the affected row count tells whether a row was created.
pub fn assignment_insert(a: &NewAssignment<'_>) -> Built {
    Query::insert()
        .into_table(EmployeeCourseAssignments::Table)
        .columns([
            EmployeeCourseAssignments::Id,
            EmployeeCourseAssignments::EmployeeId,
            EmployeeCourseAssignments::CourseId,
            EmployeeCourseAssignments::CompanyAssignmentId,
            EmployeeCourseAssignments::AssignedBy,
            EmployeeCourseAssignments::DueDate,
            EmployeeCourseAssignments::Status,
        ])
        .values_panic([
            a.id.into(),
            a.employee_id.into(),
            a.course_id.into(),
            a.company_assignment_id.into(),
            a.assigned_by.into(),
            opt_str(a.due_date),
            AssignmentStatus::Assigned.as_str().into(),
        ])
        .on_conflict(
            OnConflict::columns([
                EmployeeCourseAssignments::EmployeeId,
                EmployeeCourseAssignments::CourseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// An employee's own assignments, most recent first.
pub fn assignments_for_employee(employee_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    assignment_columns(&mut q);
    from_assignments(&mut q)
        .and_where(
            Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::EmployeeId))
                .eq(employee_id),
        )
        .order_by(
            (EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CreatedAt),
            Order::Desc,
        )
        .order_by((Courses::Table, Courses::Title), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// One assignment, only when it belongs to `employee_id`.
pub fn assignment_get(employee_id: &str, assignment_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    assignment_columns(&mut q);
    from_assignments(&mut q)
        .and_where(
            Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Id))
                .eq(assignment_id),
        )
        .and_where(
            Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::EmployeeId))
                .eq(employee_id),
        )
        .build(SqliteQueryBuilder)
}

/// Persist a status step. Start and completion times are written once.
pub fn assignment_update_step(
    assignment_id: &str,
    status: AssignmentStatus,
    progress_percentage: f64,
    started: bool,
    completed: bool,
) -> Built {
    let mut q = Query::update();
    q.table(EmployeeCourseAssignments::Table).values([
        (EmployeeCourseAssignments::Status, status.as_str().into()),
        (EmployeeCourseAssignments::ProgressPercentage, progress_percentage.into()),
    ]);
    if started {
        q.value(
            EmployeeCourseAssignments::StartedAt,
            Expr::cust("COALESCE(started_at, datetime('now'))"),
        );
    }
    if completed {
        q.value(
            EmployeeCourseAssignments::CompletedAt,
            Expr::cust("COALESCE(completed_at, datetime('now'))"),
        );
    }
    q.and_where(Expr::col(EmployeeCourseAssignments::Id).eq(assignment_id))
        .build(SqliteQueryBuilder)
}

/// Of `ids`, the non-disabled employees of `company_id`.
pub fn eligible_employees(company_id: &str, ids: &[String]) -> Built {
    Query::select()
        .column(Users::Id)
        .from(Users::Table)
        .and_where(Expr::col(Users::CompanyId).eq(company_id))
        .and_where(Expr::col(Users::Role).eq(Role::Employee.as_str()))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .and_where(Expr::col(Users::Id).is_in(ids.iter().map(String::as_str)))
        .build(SqliteQueryBuilder)
}

// ── Progress ───────────────────────────────────────────────────────────────

/// Column order: video_total_seconds, video_watched_seconds,
/// total_time_spent, required_watch_percentage, required_quiz_score,
/// quiz_attempts, best_quiz_score, passed_quiz.
pub fn progress_get(assignment_id: &str) -> Built {
    Query::select()
        .columns([
            EmployeeCourseProgress::VideoTotalSeconds,
            EmployeeCourseProgress::VideoWatchedSeconds,
            EmployeeCourseProgress::TotalTimeSpent,
            EmployeeCourseProgress::RequiredWatchPercentage,
            EmployeeCourseProgress::RequiredQuizScore,
            EmployeeCourseProgress::QuizAttempts,
            EmployeeCourseProgress::BestQuizScore,
            EmployeeCourseProgress::PassedQuiz,
        ])
        .from(EmployeeCourseProgress::Table)
        .and_where(Expr::col(EmployeeCourseProgress::AssignmentId).eq(assignment_id))
        .build(SqliteQueryBuilder)
}

/// Progress row created alongside a new assignment.
pub fn progress_insert(assignment_id: &str, progress: &CourseProgress) -> Built {
    Query::insert()
        .into_table(EmployeeCourseProgress::Table)
        .columns([
            EmployeeCourseProgress::AssignmentId,
            EmployeeCourseProgress::VideoTotalSeconds,
            EmployeeCourseProgress::RequiredWatchPercentage,
            EmployeeCourseProgress::RequiredQuizScore,
        ])
        .values_panic([
            assignment_id.into(),
            progress.video_total_seconds.into(),
            progress.required_watch_percentage.into(),
            progress.required_quiz_score.into(),
        ])
        .on_conflict(
            OnConflict::column(EmployeeCourseProgress::AssignmentId)
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Write back the mutable progress counters.
pub fn progress_update(assignment_id: &str, progress: &CourseProgress) -> Built {
    Query::update()
        .table(EmployeeCourseProgress::Table)
        .values([
            (EmployeeCourseProgress::VideoWatchedSeconds, progress.video_watched_seconds.into()),
            (EmployeeCourseProgress::TotalTimeSpent, progress.total_time_spent.into()),
            (EmployeeCourseProgress::RequiredQuizScore, progress.required_quiz_score.into()),
            (EmployeeCourseProgress::QuizAttempts, progress.quiz_attempts.into()),
            (EmployeeCourseProgress::BestQuizScore, progress.best_quiz_score.into()),
            (EmployeeCourseProgress::PassedQuiz, progress.passed_quiz.into()),
            (EmployeeCourseProgress::UpdatedAt, now_expr()),
        ])
        .and_where(Expr::col(EmployeeCourseProgress::AssignmentId).eq(assignment_id))
        .build(SqliteQueryBuilder)
}

// ── Quiz attempts ──────────────────────────────────────────────────────────

/// Values of a graded attempt.
pub struct NewAttempt<'a> {
    pub id: &'a str,
    pub employee_id: &'a str,
    pub quiz_id: &'a str,
    pub assignment_id: &'a str,
    pub attempt_number: i64,
    pub score: f64,
    pub passed: bool,
    pub time_taken_seconds: i64,
    pub answers_data: &'a str,
}

pub fn attempt_insert(a: &NewAttempt<'_>) -> Built {
    Query::insert()
        .into_table(QuizAttempts::Table)
        .columns([
            QuizAttempts::Id,
            QuizAttempts::EmployeeId,
            QuizAttempts::QuizId,
            QuizAttempts::AssignmentId,
            QuizAttempts::AttemptNumber,
            QuizAttempts::Score,
            QuizAttempts::Passed,
            QuizAttempts::TimeTakenSeconds,
            QuizAttempts::AnswersData,
        ])
        .values_panic([
            a.id.into(),
            a.employee_id.into(),
            a.quiz_id.into(),
            a.assignment_id.into(),
            a.attempt_number.into(),
            a.score.into(),
            a.passed.into(),
            a.time_taken_seconds.into(),
            a.answers_data.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Number of attempts recorded for an assignment.
pub fn attempt_count(assignment_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(QuizAttempts::Table)
        .and_where(Expr::col(QuizAttempts::AssignmentId).eq(assignment_id))
        .build(SqliteQueryBuilder)
}

// ── Certificates ───────────────────────────────────────────────────────────

/// Column order: certificate_id, employee_id, course_id, course_title,
/// assignment_id, verification_token, issued_at.
pub fn certificate_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((CourseCertificates::Table, CourseCertificates::CertificateId))
        .column((CourseCertificates::Table, CourseCertificates::EmployeeId))
        .column((CourseCertificates::Table, CourseCertificates::CourseId))
        .column((Courses::Table, Courses::Title))
        .column((CourseCertificates::Table, CourseCertificates::AssignmentId))
        .column((CourseCertificates::Table, CourseCertificates::VerificationToken))
        .column((CourseCertificates::Table, CourseCertificates::IssuedAt))
        .from(CourseCertificates::Table)
        .inner_join(
            Courses::Table,
            Expr::col((Courses::Table, Courses::Id))
                .equals((CourseCertificates::Table, CourseCertificates::CourseId)),
        )
}

/// Values of a certificate about to be issued.
pub struct NewCertificate<'a> {
    pub id: &'a str,
    pub certificate_id: &'a str,
    pub employee_id: &'a str,
    pub course_id: &'a str,
    pub assignment_id: &'a str,
    pub verification_token: &'a str,
    pub issued_by: Option<&'a str>,
}

/// Issue a certificate. A second insert for the same assignment is a no-op.
pub fn certificate_insert(c: &NewCertificate<'_>) -> Built {
    Query::insert()
        .into_table(CourseCertificates::Table)
        .columns([
            CourseCertificates::Id,
            CourseCertificates::CertificateId,
            CourseCertificates::EmployeeId,
            CourseCertificates::CourseId,
            CourseCertificates::AssignmentId,
            CourseCertificates::VerificationToken,
            CourseCertificates::IssuedBy,
        ])
        .values_panic([
            c.id.into(),
            c.certificate_id.into(),
            c.employee_id.into(),
            c.course_id.into(),
            c.assignment_id.into(),
            c.verification_token.into(),
            opt_str(c.issued_by),
        ])
        .on_conflict(
            OnConflict::column(CourseCertificates::AssignmentId)
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

pub fn certificate_for_assignment(assignment_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    certificate_columns(&mut q)
        .and_where(
            Expr::col((CourseCertificates::Table, CourseCertificates::AssignmentId))
                .eq(assignment_id),
        )
        .build(SqliteQueryBuilder)
}

pub fn certificates_for_employee(employee_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    certificate_columns(&mut q)
        .and_where(
            Expr::col((CourseCertificates::Table, CourseCertificates::EmployeeId))
                .eq(employee_id),
        )
        .order_by((CourseCertificates::Table, CourseCertificates::IssuedAt), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Public verification lookup.
///
/// Columns: certificate_id, first_name, last_name, email, course_title,
/// issued_at.
pub fn certificate_by_token(token: &str) -> Built {
    Query::select()
        .column((CourseCertificates::Table, CourseCertificates::CertificateId))
        .column((Users::Table, Users::FirstName))
        .column((Users::Table, Users::LastName))
        .column((Users::Table, Users::Email))
        .column((Courses::Table, Courses::Title))
        .column((CourseCertificates::Table, CourseCertificates::IssuedAt))
        .from(CourseCertificates::Table)
        .inner_join(
            Courses::Table,
            Expr::col((Courses::Table, Courses::Id))
                .equals((CourseCertificates::Table, CourseCertificates::CourseId)),
        )
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((CourseCertificates::Table, CourseCertificates::EmployeeId)),
        )
        .and_where(
            Expr::col((CourseCertificates::Table, CourseCertificates::VerificationToken)).eq(token),
        )
        .build(SqliteQueryBuilder)
}

// ── Profiles ───────────────────────────────────────────────────────────────

/// Create an empty profile. Existing profiles are left alone.
pub fn profile_insert(user_id: &str) -> Built {
    Query::insert()
        .into_table(EmployeeProfiles::Table)
        .columns([EmployeeProfiles::UserId])
        .values_panic([user_id.into()])
        .on_conflict(
            OnConflict::column(EmployeeProfiles::UserId)
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Column order: user_id, employee_id, completed_courses_count,
/// average_quiz_score, phishing_tests_taken, phishing_tests_passed,
/// awareness_score.
pub fn profile_get(user_id: &str) -> Built {
    Query::select()
        .columns([
            EmployeeProfiles::UserId,
            EmployeeProfiles::EmployeeId,
            EmployeeProfiles::CompletedCoursesCount,
            EmployeeProfiles::AverageQuizScore,
            EmployeeProfiles::PhishingTestsTaken,
            EmployeeProfiles::PhishingTestsPassed,
            EmployeeProfiles::AwarenessScore,
        ])
        .from(EmployeeProfiles::Table)
        .and_where(Expr::col(EmployeeProfiles::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Course statistics feeding the awareness score.
///
/// Columns: completed course count, average best quiz score (NULL without
/// attempts).
pub fn course_stats(user_id: &str) -> Built {
    Query::select()
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM employee_course_assignments \
                 WHERE employee_id = ? AND status = 'completed')",
                [user_id],
            ),
            Alias::new("completed"),
        )
        .expr_as(
            Expr::cust_with_values(
                "(SELECT AVG(p.best_quiz_score) FROM employee_course_progress p \
                 JOIN employee_course_assignments a ON a.id = p.assignment_id \
                 WHERE a.employee_id = ? AND p.best_quiz_score IS NOT NULL)",
                [user_id],
            ),
            Alias::new("average_quiz_score"),
        )
        .build(SqliteQueryBuilder)
}

/// Count one phishing test for the user.
pub fn profile_record_phishing(user_id: &str, passed: bool) -> Built {
    Query::update()
        .table(EmployeeProfiles::Table)
        .values([
            (
                EmployeeProfiles::PhishingTestsTaken,
                Expr::col(EmployeeProfiles::PhishingTestsTaken).add(1),
            ),
            (
                EmployeeProfiles::PhishingTestsPassed,
                Expr::col(EmployeeProfiles::PhishingTestsPassed).add(i64::from(passed)),
            ),
        ])
        .and_where(Expr::col(EmployeeProfiles::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Store recomputed course statistics and awareness score.
pub fn profile_update_scores(
    user_id: &str,
    completed_courses: i64,
    average_quiz_score: f64,
    awareness_score: f64,
) -> Built {
    Query::update()
        .table(EmployeeProfiles::Table)
        .values([
            (EmployeeProfiles::CompletedCoursesCount, completed_courses.into()),
            (EmployeeProfiles::AverageQuizScore, average_quiz_score.into()),
            (EmployeeProfiles::AwarenessScore, awareness_score.into()),
            (EmployeeProfiles::UpdatedAt, now_expr()),
        ])
        .and_where(Expr::col(EmployeeProfiles::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_update_stamps_times_once() {
        let (sql, _) =
            assignment_update_step("a1", AssignmentStatus::Completed, 100.0, true, true);
        assert!(sql.contains("COALESCE(started_at"));
        assert!(sql.contains("COALESCE(completed_at"));
        let (sql, _) = assignment_update_step("a1", AssignmentStatus::InProgress, 40.0, false, false);
        assert!(!sql.contains("started_at"));
    }

    #[test]
    fn certificate_insert_ignores_duplicates() {
        let (sql, _) = certificate_insert(&NewCertificate {
            id: "x",
            certificate_id: "CERT-000000000000",
            employee_id: "e",
            course_id: "c",
            assignment_id: "a",
            verification_token: "t",
            issued_by: None,
        });
        assert!(sql.contains(r#"ON CONFLICT ("assignment_id") DO NOTHING"#));
    }

    #[test]
    fn course_stats_binds_user_twice() {
        let (_, values) = course_stats("u1");
        assert_eq!(values.0.len(), 2);
    }
}
