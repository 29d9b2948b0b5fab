//! Employee-facing learning: assignments, video progress, quiz attempts,
//! certificates, and the awareness profile.

use axum::{
    Json,
    extract::{Path, State},
};
use rusqlite::Connection;

use awarenow_api::db::learning::{NewAttempt, NewCertificate};
use awarenow_api::progress::{self, CourseProgress};
use awarenow_api::quiz::{self, AnswerKey, AttemptPolicy};
use awarenow_api::{
    AssignmentResponse, CertificateResponse, CertificateVerificationResponse,
    ListAssignmentsResponse, ListCertificatesResponse, ProfileResponse, ProgressResponse,
    QuizAttemptResponse, QuizResponse, SubmitQuizRequest, WatchRequest, db, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::courses::load_quiz;
use crate::routes::today;
use crate::storage::{
    Db, assignment_from_row, certificate_from_row, progress_from_row, refresh_employee_profile,
    sq_execute, sq_query_map, sq_query_opt, sq_query_row,
};

fn progress_response(p: &CourseProgress) -> ProgressResponse {
    ProgressResponse {
        video_total_seconds: p.video_total_seconds,
        video_watched_seconds: p.video_watched_seconds,
        total_time_spent: p.total_time_spent,
        required_watch_percentage: p.required_watch_percentage,
        required_quiz_score: p.required_quiz_score,
        quiz_attempts: p.quiz_attempts,
        best_quiz_score: p.best_quiz_score,
        passed_quiz: p.passed_quiz,
        watch_percentage: p.watch_percentage(),
    }
}

fn with_overdue(mut assignment: AssignmentResponse, today: &str) -> AssignmentResponse {
    assignment.is_overdue =
        progress::is_overdue(assignment.status, assignment.due_date.as_deref(), today);
    assignment
}

fn load_assignment(
    conn: &Connection,
    employee_id: &str,
    assignment_id: &str,
) -> Result<AssignmentResponse, ApiErr> {
    sq_query_opt(
        conn,
        db::learning::assignment_get(employee_id, assignment_id),
        assignment_from_row,
    )
    .map_err(ApiErr::from_db("assignment lookup"))?
    .ok_or_else(|| ApiErr::not_found("assignment not found"))
}

fn load_progress(conn: &Connection, assignment_id: &str) -> Result<CourseProgress, ApiErr> {
    sq_query_opt(conn, db::learning::progress_get(assignment_id), progress_from_row)
        .map_err(ApiErr::from_db("progress lookup"))?
        .ok_or_else(|| {
            tracing::error!(%assignment_id, "assignment has no progress row");
            ApiErr::internal("internal server error")
        })
}

/// The assignment with its progress counters, as returned by the detail
/// endpoints.
fn assignment_detail(
    conn: &Connection,
    employee_id: &str,
    assignment_id: &str,
) -> Result<AssignmentResponse, ApiErr> {
    let mut assignment = with_overdue(load_assignment(conn, employee_id, assignment_id)?, &today());
    assignment.progress = Some(progress_response(&load_progress(conn, assignment_id)?));
    Ok(assignment)
}

fn has_quiz(conn: &Connection, course_id: &str) -> Result<bool, ApiErr> {
    sq_query_opt(conn, db::courses::quiz_by_course(course_id), |row| {
        row.get::<_, String>(0)
    })
    .map(|quiz| quiz.is_some())
    .map_err(ApiErr::from_db("quiz lookup"))
}

/// Persist counters and status after learner activity. On completion the
/// certificate is issued; returns it when the assignment is completed.
fn apply_step(
    conn: &Connection,
    assignment: &AssignmentResponse,
    progress: &CourseProgress,
    has_quiz: bool,
) -> Result<Option<CertificateResponse>, ApiErr> {
    let step = progress::advance(assignment.status, progress, has_quiz);
    sq_execute(conn, db::learning::progress_update(&assignment.id, progress))
        .map_err(ApiErr::from_db("save progress"))?;
    sq_execute(
        conn,
        db::learning::assignment_update_step(
            &assignment.id,
            step.status,
            step.progress_percentage,
            step.started,
            step.completed,
        ),
    )
    .map_err(ApiErr::from_db("save assignment step"))?;

    if !step.completed {
        return Ok(None);
    }

    sq_execute(
        conn,
        db::learning::certificate_insert(&NewCertificate {
            id: &service::new_id(),
            certificate_id: &service::generate_certificate_id(),
            employee_id: &assignment.employee_id,
            course_id: &assignment.course_id,
            assignment_id: &assignment.id,
            verification_token: &service::generate_verification_token(),
            issued_by: None,
        }),
    )
    .map_err(ApiErr::from_db("issue certificate"))?;
    let certificate = sq_query_opt(
        conn,
        db::learning::certificate_for_assignment(&assignment.id),
        certificate_from_row,
    )
    .map_err(ApiErr::from_db("certificate lookup"))?;
    tracing::info!(
        assignment_id = %assignment.id,
        employee_id = %assignment.employee_id,
        "course completed"
    );
    Ok(certificate)
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// GET /api/me/assignments
pub async fn list_assignments(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListAssignmentsResponse>, ApiErr> {
    user.employee_scope()?;
    let today = today();
    let conn = db.conn();
    let assignments = sq_query_map(
        &conn,
        db::learning::assignments_for_employee(&user.user_id),
        assignment_from_row,
    )
    .map_err(ApiErr::from_db("list assignments"))?
    .into_iter()
    .map(|a| with_overdue(a, &today))
    .collect();
    Ok(Json(ListAssignmentsResponse { assignments }))
}

/// GET /api/me/assignments/:id
pub async fn get_assignment(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<AssignmentResponse>, ApiErr> {
    user.employee_scope()?;
    let conn = db.conn();
    assignment_detail(&conn, &user.user_id, &id).map(Json)
}

/// POST /api/me/assignments/:id/watch — report the video position.
pub async fn record_watch(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<WatchRequest>,
) -> Result<Json<AssignmentResponse>, ApiErr> {
    user.employee_scope()?;
    let mut conn = db.conn();
    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;

    let assignment = load_assignment(&tx, &user.user_id, &id)?;
    progress::ensure_open(assignment.status)?;
    let mut progress = load_progress(&tx, &id)?;
    progress.record_watch(req.watched_seconds, req.time_spent_seconds.unwrap_or(0))?;

    let has_quiz = has_quiz(&tx, &assignment.course_id)?;
    if apply_step(&tx, &assignment, &progress, has_quiz)?.is_some() {
        refresh_employee_profile(&tx, &user.user_id)
            .map_err(ApiErr::from_db("refresh profile"))?;
    }

    let detail = assignment_detail(&tx, &user.user_id, &id)?;
    tx.commit().map_err(ApiErr::from_db("commit"))?;
    Ok(Json(detail))
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

fn assignment_quiz(conn: &Connection, course_id: &str) -> Result<QuizResponse, ApiErr> {
    load_quiz(conn, course_id)?.ok_or_else(|| ApiErr::not_found("course has no quiz"))
}

/// GET /api/me/assignments/:id/quiz — questions without answer keys.
pub async fn get_quiz(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<QuizResponse>, ApiErr> {
    user.employee_scope()?;
    let conn = db.conn();
    let assignment = load_assignment(&conn, &user.user_id, &id)?;
    let mut quiz = assignment_quiz(&conn, &assignment.course_id)?;
    for question in &mut quiz.questions {
        question.correct_answers = None;
        question.explanation = None;
    }
    Ok(Json(quiz))
}

/// POST /api/me/assignments/:id/quiz — grade an attempt.
pub async fn submit_quiz(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<Json<QuizAttemptResponse>, ApiErr> {
    user.employee_scope()?;
    if req.time_taken_seconds < 0 {
        return Err(ApiErr::bad_request("time_taken_seconds must not be negative"));
    }
    let answers_data = serde_json::to_string(&req.answers).map_err(|e| {
        tracing::error!("serialize quiz answers: {e}");
        ApiErr::internal("internal server error")
    })?;

    let mut conn = db.conn();
    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;

    let assignment = load_assignment(&tx, &user.user_id, &id)?;
    progress::ensure_open(assignment.status)?;
    let quiz = assignment_quiz(&tx, &assignment.course_id)?;
    if quiz.questions.is_empty() {
        return Err(ApiErr::bad_request("quiz has no questions"));
    }
    let mut progress = load_progress(&tx, &id)?;
    progress.required_quiz_score = quiz.passing_score;

    let previous: i64 = sq_query_row(&tx, db::learning::attempt_count(&id), |row| row.get(0))
        .map_err(ApiErr::from_db("attempt count"))?;
    let policy = AttemptPolicy {
        passing_score: quiz.passing_score,
        time_limit_minutes: quiz.time_limit_minutes,
        max_attempts: quiz.max_attempts,
    };
    policy.check_can_attempt(previous, progress.passed_quiz)?;

    let keys: Vec<AnswerKey> = quiz
        .questions
        .iter()
        .map(|q| AnswerKey {
            question_id: q.id.clone(),
            correct: quiz::parse_answer_key(q.correct_answers.as_deref().unwrap_or_default()),
            points: q.points,
        })
        .collect();
    let grade = quiz::grade(&keys, &req.answers);
    let outcome = policy.evaluate(&grade, req.time_taken_seconds);
    let attempt_number = previous + 1;

    sq_execute(
        &tx,
        db::learning::attempt_insert(&NewAttempt {
            id: &service::new_id(),
            employee_id: &user.user_id,
            quiz_id: &quiz.id,
            assignment_id: &id,
            attempt_number,
            score: outcome.score,
            passed: outcome.passed,
            time_taken_seconds: req.time_taken_seconds,
            answers_data: &answers_data,
        }),
    )
    .map_err(ApiErr::from_db("record attempt"))?;

    progress.record_attempt(outcome.score, outcome.passed);
    let certificate = apply_step(&tx, &assignment, &progress, true)?;
    refresh_employee_profile(&tx, &user.user_id).map_err(ApiErr::from_db("refresh profile"))?;

    let detail = assignment_detail(&tx, &user.user_id, &id)?;
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    tracing::info!(
        assignment_id = %id,
        attempt_number,
        score = outcome.score,
        passed = outcome.passed,
        late = outcome.late,
        "quiz attempt graded"
    );
    Ok(Json(QuizAttemptResponse {
        attempt_number,
        score: outcome.score,
        passed: outcome.passed,
        late: outcome.late,
        assignment: detail,
        certificate,
    }))
}

// ---------------------------------------------------------------------------
// Certificates and profile
// ---------------------------------------------------------------------------

/// GET /api/me/certificates
pub async fn list_certificates(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListCertificatesResponse>, ApiErr> {
    user.employee_scope()?;
    let conn = db.conn();
    let certificates = sq_query_map(
        &conn,
        db::learning::certificates_for_employee(&user.user_id),
        certificate_from_row,
    )
    .map_err(ApiErr::from_db("list certificates"))?;
    Ok(Json(ListCertificatesResponse { certificates }))
}

/// GET /api/me/profile — recomputed on read.
pub async fn profile(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, ApiErr> {
    user.employee_scope()?;
    let conn = db.conn();
    refresh_employee_profile(&conn, &user.user_id)
        .map(Json)
        .map_err(ApiErr::from_db("profile"))
}

/// GET /api/certificates/verify/:token — public.
pub async fn verify_certificate(
    State(db): State<Db>,
    Path(token): Path<String>,
) -> Result<Json<CertificateVerificationResponse>, ApiErr> {
    let conn = db.conn();
    sq_query_opt(&conn, db::learning::certificate_by_token(&token), |row| {
        let first: String = row.get(1)?;
        let last: String = row.get(2)?;
        let email: String = row.get(3)?;
        let name = format!("{first} {last}").trim().to_string();
        Ok(CertificateVerificationResponse {
            certificate_id: row.get(0)?,
            employee_name: if name.is_empty() { email } else { name },
            course_title: row.get(4)?,
            issued_at: row.get(5)?,
        })
    })
    .map_err(ApiErr::from_db("certificate lookup"))?
    .map(Json)
    .ok_or_else(|| ApiErr::not_found("certificate not found"))
}
