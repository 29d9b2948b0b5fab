use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;

use awarenow_api::db::courses::{NewQuestion, QuizFields};
use awarenow_api::db::learning::NewAssignment;
use awarenow_api::progress::{CourseProgress, DEFAULT_REQUIRED_QUIZ_SCORE};
use awarenow_api::{
    AssignCompaniesRequest, AssignCountResponse, AssignEmployeesRequest, CategoryResponse,
    CompanyCourseResponse, CourseListQuery, CourseRequest, CourseResponse, CreateCategoryRequest,
    CreateQuestionRequest, ListCategoriesResponse, ListCompanyCoursesResponse, ListCoursesResponse,
    QuestionResponse, QuizResponse, UpsertQuizRequest, db, quiz, service,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, category_from_row, course_from_row, group_from_row, is_constraint_violation,
    question_from_row, quiz_from_row, sq_execute, sq_query_map, sq_query_opt, sq_query_row,
};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// POST /api/platform/categories
pub async fn create_category(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiErr> {
    user.require_platform_admin()?;
    let name = service::validate_name("name", &req.name, 100)?;
    let id = service::new_id();
    let conn = db.conn();
    sq_execute(
        &conn,
        db::courses::category_insert(
            &id,
            &name,
            service::non_blank(req.description.as_deref()).as_deref(),
            service::non_blank(req.icon.as_deref()).as_deref(),
            service::non_blank(req.color.as_deref()).as_deref(),
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("a category with this name already exists")
        } else {
            ApiErr::from_db("create category")(e)
        }
    })?;
    let category = sq_query_row(&conn, db::courses::category_get(&id), category_from_row)
        .map_err(ApiErr::from_db("reload category"))?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/platform/categories — with course counts.
pub async fn list_categories(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListCategoriesResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let categories = sq_query_map(&conn, db::courses::category_list(), category_from_row)
        .map_err(ApiErr::from_db("list categories"))?;
    Ok(Json(ListCategoriesResponse { categories }))
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

fn load_course(conn: &Connection, id: &str) -> Result<CourseResponse, ApiErr> {
    sq_query_opt(conn, db::courses::course_get(id), course_from_row)
        .map_err(ApiErr::from_db("course lookup"))?
        .ok_or_else(|| ApiErr::not_found("course not found"))
}

fn validated_course(conn: &Connection, req: &CourseRequest) -> Result<CourseRequest, ApiErr> {
    let course = service::validate_course(req)?;
    if let Some(category_id) = &course.category_id {
        sq_query_opt(conn, db::courses::category_get(category_id), category_from_row)
            .map_err(ApiErr::from_db("category lookup"))?
            .ok_or_else(|| ApiErr::bad_request("unknown category"))?;
    }
    Ok(course)
}

/// POST /api/platform/courses
pub async fn create_course(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let course = validated_course(&conn, &req)?;
    let id = service::new_id();
    sq_execute(&conn, db::courses::course_insert(&id, &course, &user.user_id))
        .map_err(ApiErr::from_db("create course"))?;
    tracing::info!(course_id = %id, published = course.is_published, "course created");
    Ok((StatusCode::CREATED, Json(load_course(&conn, &id)?)))
}

/// PUT /api/platform/courses/:id
pub async fn update_course(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CourseRequest>,
) -> Result<Json<CourseResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load_course(&conn, &id)?;
    let course = validated_course(&conn, &req)?;
    sq_execute(&conn, db::courses::course_update(&id, &course))
        .map_err(ApiErr::from_db("update course"))?;
    load_course(&conn, &id).map(Json)
}

/// GET /api/platform/courses/:id
pub async fn get_course(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CourseResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load_course(&conn, &id).map(Json)
}

/// GET /api/platform/courses?status=published|draft&category=
pub async fn list_courses(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<CourseListQuery>,
) -> Result<Json<ListCoursesResponse>, ApiErr> {
    user.require_platform_admin()?;
    let published = match q.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some("published") => Some(true),
        Some("draft") => Some(false),
        Some(other) => return Err(ApiErr::bad_request(format!("unknown status filter {other:?}"))),
    };
    let category = service::non_blank(q.category.as_deref());
    let conn = db.conn();
    let courses = sq_query_map(
        &conn,
        db::courses::course_list(published, category.as_deref()),
        course_from_row,
    )
    .map_err(ApiErr::from_db("list courses"))?;
    Ok(Json(ListCoursesResponse { courses }))
}

/// POST /api/platform/courses/:id/assign — assign to ACTIVE companies.
/// Existing assignments are skipped.
pub async fn assign_to_companies(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<AssignCompaniesRequest>,
) -> Result<Json<AssignCountResponse>, ApiErr> {
    user.require_platform_admin()?;
    let mut conn = db.conn();
    load_course(&conn, &id)?;
    if req.company_ids.is_empty() {
        return Err(ApiErr::bad_request("select at least one company"));
    }

    let companies: Vec<String> =
        sq_query_map(&conn, db::companies::filter_active(&req.company_ids), |row| row.get(0))
            .map_err(ApiErr::from_db("filter companies"))?;

    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    let mut assigned = 0;
    for company_id in &companies {
        assigned += sq_execute(
            &tx,
            db::courses::company_assign(&service::new_id(), company_id, &id, &user.user_id),
        )
        .map_err(ApiErr::from_db("assign course"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    tracing::info!(course_id = %id, assigned, "course assigned to companies");
    Ok(Json(AssignCountResponse { assigned }))
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// The course's quiz with every question, answer keys included.
pub(crate) fn load_quiz(conn: &Connection, course_id: &str) -> Result<Option<QuizResponse>, ApiErr> {
    let Some(mut quiz) = sq_query_opt(conn, db::courses::quiz_by_course(course_id), quiz_from_row)
        .map_err(ApiErr::from_db("quiz lookup"))?
    else {
        return Ok(None);
    };
    quiz.questions = sq_query_map(conn, db::courses::questions(&quiz.id), question_from_row)
        .map_err(ApiErr::from_db("quiz questions"))?;
    Ok(Some(quiz))
}

/// PUT /api/platform/courses/:id/quiz — create or update the course quiz.
pub async fn upsert_quiz(
    State(db): State<Db>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<UpsertQuizRequest>,
) -> Result<Json<QuizResponse>, ApiErr> {
    user.require_platform_admin()?;
    let title = service::validate_name("title", &req.title, 200)?;
    let description = service::non_blank(req.description.as_deref());
    let passing_score = service::validate_percentage(
        "passing_score",
        req.passing_score.unwrap_or(DEFAULT_REQUIRED_QUIZ_SCORE),
    )?;
    let time_limit_minutes = req.time_limit_minutes.unwrap_or(0);
    let max_attempts = req.max_attempts.unwrap_or(0);
    if time_limit_minutes < 0 || max_attempts < 0 {
        return Err(ApiErr::bad_request(
            "time_limit_minutes and max_attempts must not be negative",
        ));
    }

    let conn = db.conn();
    load_course(&conn, &course_id)?;
    sq_execute(
        &conn,
        db::courses::quiz_upsert(
            &service::new_id(),
            &course_id,
            &QuizFields {
                title: &title,
                description: description.as_deref(),
                passing_score,
                time_limit_minutes,
                max_attempts,
            },
        ),
    )
    .map_err(ApiErr::from_db("save quiz"))?;

    load_quiz(&conn, &course_id)?
        .map(Json)
        .ok_or_else(|| ApiErr::internal("internal server error"))
}

/// GET /api/platform/courses/:id/quiz — with answer keys.
pub async fn get_quiz(
    State(db): State<Db>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> Result<Json<QuizResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load_course(&conn, &course_id)?;
    load_quiz(&conn, &course_id)?
        .map(Json)
        .ok_or_else(|| ApiErr::not_found("course has no quiz"))
}

/// POST /api/platform/quizzes/:id/questions
pub async fn add_question(
    State(db): State<Db>,
    user: AuthUser,
    Path(quiz_id): Path<String>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiErr> {
    user.require_platform_admin()?;
    let question_text = service::validate_name("question_text", &req.question_text, 2000)?;
    let options = [
        service::non_blank(req.option_a.as_deref()),
        service::non_blank(req.option_b.as_deref()),
        service::non_blank(req.option_c.as_deref()),
        service::non_blank(req.option_d.as_deref()),
    ];
    let [a, b, c, d] = &options;
    let option_refs = [a.as_deref(), b.as_deref(), c.as_deref(), d.as_deref()];
    let correct_answers =
        quiz::validate_answer_key(req.question_type, option_refs, &req.correct_answers)?;
    let points = req.points.unwrap_or(1);
    if points < 1 {
        return Err(ApiErr::bad_request("points must be at least 1"));
    }
    let explanation = service::non_blank(req.explanation.as_deref());

    let conn = db.conn();
    sq_query_opt(&conn, db::courses::quiz_get(&quiz_id), quiz_from_row)
        .map_err(ApiErr::from_db("quiz lookup"))?
        .ok_or_else(|| ApiErr::not_found("quiz not found"))?;
    let sort_order = match req.sort_order {
        Some(order) => order,
        None => sq_query_row(&conn, db::courses::next_sort_order(&quiz_id), |row| row.get(0))
            .map_err(ApiErr::from_db("next sort order"))?,
    };

    let id = service::new_id();
    sq_execute(
        &conn,
        db::courses::question_insert(&NewQuestion {
            id: &id,
            quiz_id: &quiz_id,
            question_text: &question_text,
            question_type: req.question_type,
            options: option_refs,
            correct_answers: &correct_answers,
            points,
            explanation: explanation.as_deref(),
            sort_order,
        }),
    )
    .map_err(ApiErr::from_db("create question"))?;

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            id,
            question_text,
            question_type: req.question_type,
            option_a: a.clone(),
            option_b: b.clone(),
            option_c: c.clone(),
            option_d: d.clone(),
            correct_answers: Some(correct_answers),
            points,
            explanation,
            sort_order,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Company side
// ---------------------------------------------------------------------------

/// GET /api/company/courses — courses assigned to the caller's company.
pub async fn company_courses(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListCompanyCoursesResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let courses = sq_query_map(&conn, db::courses::company_courses(company_id), |row| {
        Ok(CompanyCourseResponse {
            course: course_from_row(row)?,
            assigned_at: row.get(14)?,
        })
    })
    .map_err(ApiErr::from_db("company courses"))?;
    Ok(Json(ListCompanyCoursesResponse { courses }))
}

/// POST /api/company/courses/:course_id/assign — assign a published course
/// to employees, listed directly and/or through a group.
pub async fn assign_to_employees(
    State(db): State<Db>,
    user: AuthUser,
    Path(course_id): Path<String>,
    Json(req): Json<AssignEmployeesRequest>,
) -> Result<Json<AssignCountResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let due_date = service::validate_optional_date("due_date", req.due_date.as_deref())?;

    let mut conn = db.conn();
    let (company_assignment_id, is_published, duration_minutes): (String, bool, i64) =
        sq_query_opt(
            &conn,
            db::courses::company_assignment(company_id, &course_id),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(ApiErr::from_db("company assignment lookup"))?
        .ok_or_else(|| ApiErr::not_found("course is not assigned to this company"))?;
    if !is_published {
        return Err(ApiErr::bad_request("course is not published"));
    }

    let mut targets: BTreeSet<String> = req.employee_ids.iter().cloned().collect();
    if let Some(group_id) = service::non_blank(req.group_id.as_deref()) {
        sq_query_opt(&conn, db::groups::get(company_id, &group_id), group_from_row)
            .map_err(ApiErr::from_db("group lookup"))?
            .ok_or_else(|| ApiErr::not_found("group not found"))?;
        let members: Vec<String> =
            sq_query_map(&conn, db::groups::member_ids(&group_id), |row| row.get(0))
                .map_err(ApiErr::from_db("group members"))?;
        targets.extend(members);
    }
    if targets.is_empty() {
        return Err(ApiErr::bad_request("select at least one employee or a group"));
    }

    let targets: Vec<String> = targets.into_iter().collect();
    let employees: Vec<String> = sq_query_map(
        &conn,
        db::learning::eligible_employees(company_id, &targets),
        |row| row.get(0),
    )
    .map_err(ApiErr::from_db("eligible employees"))?;

    let required_quiz_score = load_quiz(&conn, &course_id)?
        .map(|q| q.passing_score)
        .unwrap_or(DEFAULT_REQUIRED_QUIZ_SCORE);
    let progress = CourseProgress::new(duration_minutes * 60, required_quiz_score);

    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    let mut assigned = 0;
    for employee_id in &employees {
        let id = service::new_id();
        let created = sq_execute(
            &tx,
            db::learning::assignment_insert(&NewAssignment {
                id: &id,
                employee_id,
                course_id: &course_id,
                company_assignment_id: &company_assignment_id,
                assigned_by: &user.user_id,
                due_date: due_date.as_deref(),
            }),
        )
        .map_err(ApiErr::from_db("assign employee"))?;
        if created > 0 {
            sq_execute(&tx, db::learning::progress_insert(&id, &progress))
                .map_err(ApiErr::from_db("create progress"))?;
            assigned += 1;
        }
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    tracing::info!(%course_id, %company_id, assigned, "course assigned to employees");
    Ok(Json(AssignCountResponse { assigned }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use awarenow_api::Role;

    use crate::testing::TestApp;

    fn platform() -> (TestApp, String) {
        let app = TestApp::new();
        app.seed_user("root", None, "root@awarenow.test", Role::PlatformAdmin);
        let root = app.token("root", Role::PlatformAdmin);
        (app, root)
    }

    #[tokio::test]
    async fn catalog_is_built_from_category_to_question() {
        let (app, root) = platform();

        let (status, category) = app
            .call(
                Method::POST,
                "/api/platform/categories",
                Some(&root),
                Some(json!({ "name": "Email Safety", "color": "#0055ff" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let category_id = category["id"].as_str().expect("category id").to_string();
        let (status, _) = app
            .call(
                Method::POST,
                "/api/platform/categories",
                Some(&root),
                Some(json!({ "name": "Email Safety" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, err) = app
            .call(
                Method::POST,
                "/api/platform/courses",
                Some(&root),
                Some(json!({ "title": "Hi", "video_duration_minutes": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "Title must be at least 5 characters long.");

        let (status, course) = app
            .call(
                Method::POST,
                "/api/platform/courses",
                Some(&root),
                Some(json!({
                    "title": "Spotting phishing",
                    "category_id": category_id,
                    "video_duration_minutes": 12,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{course}");
        assert_eq!(course["is_published"], false);
        assert_eq!(course["visibility"], "all");
        let course_id = course["id"].as_str().expect("course id").to_string();

        let (_, drafts) = app
            .call(Method::GET, "/api/platform/courses?status=draft", Some(&root), None)
            .await;
        assert_eq!(drafts["courses"].as_array().map(Vec::len), Some(1));
        let (status, _) = app
            .call(Method::GET, "/api/platform/courses?status=archived", Some(&root), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, categories) = app
            .call(Method::GET, "/api/platform/categories", Some(&root), None)
            .await;
        assert_eq!(categories["categories"][0]["course_count"], 1);

        let quiz_uri = format!("/api/platform/courses/{course_id}/quiz");
        let (status, _) = app.call(Method::GET, &quiz_uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, quiz) = app
            .call(Method::PUT, &quiz_uri, Some(&root), Some(json!({ "title": "Check" })))
            .await;
        assert_eq!(status, StatusCode::OK, "{quiz}");
        assert_eq!(quiz["passing_score"], 70.0);
        assert_eq!(quiz["max_attempts"], 0);
        let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();

        let (_, updated) = app
            .call(
                Method::PUT,
                &quiz_uri,
                Some(&root),
                Some(json!({ "title": "Check", "passing_score": 80.0, "max_attempts": 3 })),
            )
            .await;
        assert_eq!(updated["id"], quiz_id.as_str());
        assert_eq!(updated["max_attempts"], 3);

        let questions_uri = format!("/api/platform/quizzes/{quiz_id}/questions");
        let (status, first) = app
            .call(
                Method::POST,
                &questions_uri,
                Some(&root),
                Some(json!({
                    "question_text": "Which links are suspicious?",
                    "question_type": "multiple_select",
                    "option_a": "Shortened URL",
                    "option_b": "Company intranet",
                    "option_c": "Lookalike domain",
                    "correct_answers": "c, a",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{first}");
        assert_eq!(first["correct_answers"], "A,C");
        assert_eq!(first["points"], 1);
        assert_eq!(first["sort_order"], 1);

        let (status, err) = app
            .call(
                Method::POST,
                &questions_uri,
                Some(&root),
                Some(json!({
                    "question_text": "Pick one",
                    "question_type": "multiple_choice",
                    "option_a": "Yes",
                    "option_b": "No",
                    "correct_answers": "A,B",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{err}");

        let (status, _) = app
            .call(
                Method::POST,
                &questions_uri,
                Some(&root),
                Some(json!({
                    "question_text": "Report it?",
                    "question_type": "true_false",
                    "correct_answers": "A",
                    "points": 2,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, quiz) = app.call(Method::GET, &quiz_uri, Some(&root), None).await;
        let orders: Vec<_> = quiz["questions"]
            .as_array()
            .expect("questions")
            .iter()
            .map(|q| q["sort_order"].as_i64())
            .collect();
        assert_eq!(orders, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn courses_reach_active_companies_then_employees() {
        let (app, root) = platform();
        app.seed_company("acme", None);
        app.seed_company("frozen", None);
        app.db
            .conn()
            .execute("UPDATE companies SET status = 'SUSPENDED' WHERE id = 'frozen'", [])
            .expect("suspend");
        app.seed_user("admin", Some("acme"), "admin@acme.test", Role::CompanyAdmin);
        app.seed_user("ann", Some("acme"), "ann@acme.test", Role::Employee);
        app.seed_user("bob", Some("acme"), "bob@acme.test", Role::Employee);
        app.seed_user("cy", Some("acme"), "cy@acme.test", Role::Employee);
        app.seed_group("ops", "acme", &["bob", "cy", "admin"]);
        app.seed_course("draft-course", 5, false);
        app.seed_course("live-course", 5, true);
        let admin = app.token("admin", Role::CompanyAdmin);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/platform/courses/live-course/assign",
                Some(&root),
                Some(json!({ "company_ids": [] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for course in ["draft-course", "live-course"] {
            let (status, body) = app
                .call(
                    Method::POST,
                    &format!("/api/platform/courses/{course}/assign"),
                    Some(&root),
                    Some(json!({ "company_ids": ["acme", "frozen", "nowhere"] })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["assigned"], 1);
        }
        let (_, again) = app
            .call(
                Method::POST,
                "/api/platform/courses/live-course/assign",
                Some(&root),
                Some(json!({ "company_ids": ["acme"] })),
            )
            .await;
        assert_eq!(again["assigned"], 0);

        let (_, listed) = app.call(Method::GET, "/api/company/courses", Some(&admin), None).await;
        assert_eq!(listed["courses"].as_array().map(Vec::len), Some(2));

        let (status, _) = app
            .call(
                Method::POST,
                "/api/company/courses/draft-course/assign",
                Some(&admin),
                Some(json!({ "employee_ids": ["ann"] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app
            .call(
                Method::POST,
                "/api/company/courses/live-course/assign",
                Some(&admin),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .call(
                Method::POST,
                "/api/company/courses/live-course/assign",
                Some(&admin),
                Some(json!({ "employee_ids": ["ann", "bob"], "group_id": "ops", "due_date": "2030-01-31" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["assigned"], 3);
        assert_eq!(
            app.count("SELECT COUNT(*) FROM employee_course_progress"),
            3
        );

        let (_, repeat) = app
            .call(
                Method::POST,
                "/api/company/courses/live-course/assign",
                Some(&admin),
                Some(json!({ "group_id": "ops" })),
            )
            .await;
        assert_eq!(repeat["assigned"], 0);
    }
}
