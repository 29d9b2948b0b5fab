//! Course catalog, company assignment, and quiz authoring query builders.

use sea_query::{
    Alias, Expr, OnConflict, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
};

use super::tables::{CompanyCourseAssignments, CourseCategories, Courses, QuizQuestions, Quizzes};
use super::{Built, now_expr, opt_str};
use crate::{CourseRequest, QuestionType};

// ── Categories ─────────────────────────────────────────────────────────────

/// Column order: id, name, description, icon, color, course_count.
pub fn category_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((CourseCategories::Table, CourseCategories::Id))
        .column((CourseCategories::Table, CourseCategories::Name))
        .column((CourseCategories::Table, CourseCategories::Description))
        .column((CourseCategories::Table, CourseCategories::Icon))
        .column((CourseCategories::Table, CourseCategories::Color))
        .expr_as(
            Expr::cust("(SELECT COUNT(*) FROM courses c WHERE c.category_id = course_categories.id)"),
            Alias::new("course_count"),
        )
}

pub fn category_insert(
    id: &str,
    name: &str,
    description: Option<&str>,
    icon: Option<&str>,
    color: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(CourseCategories::Table)
        .columns([
            CourseCategories::Id,
            CourseCategories::Name,
            CourseCategories::Description,
            CourseCategories::Icon,
            CourseCategories::Color,
        ])
        .values_panic([
            id.into(),
            name.into(),
            opt_str(description),
            opt_str(icon),
            opt_str(color),
        ])
        .build(SqliteQueryBuilder)
}

pub fn category_get(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    category_columns(&mut q);
    q.from(CourseCategories::Table)
        .and_where(Expr::col((CourseCategories::Table, CourseCategories::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn category_list() -> Built {
    let mut q = Query::select().to_owned();
    category_columns(&mut q);
    q.from(CourseCategories::Table)
        .order_by((CourseCategories::Table, CourseCategories::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

// ── Courses ────────────────────────────────────────────────────────────────

/// Column order: id, title, brief_description, category_id, thumbnail_url,
/// video_url, video_duration_minutes, visibility, points_reward,
/// is_published, published_at, created_by, created_at, updated_at.
pub fn course_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Courses::Table, Courses::Id))
        .column((Courses::Table, Courses::Title))
        .column((Courses::Table, Courses::BriefDescription))
        .column((Courses::Table, Courses::CategoryId))
        .column((Courses::Table, Courses::ThumbnailUrl))
        .column((Courses::Table, Courses::VideoUrl))
        .column((Courses::Table, Courses::VideoDurationMinutes))
        .column((Courses::Table, Courses::Visibility))
        .column((Courses::Table, Courses::PointsReward))
        .column((Courses::Table, Courses::IsPublished))
        .column((Courses::Table, Courses::PublishedAt))
        .column((Courses::Table, Courses::CreatedBy))
        .column((Courses::Table, Courses::CreatedAt))
        .column((Courses::Table, Courses::UpdatedAt))
}

/// INSERT a validated course. Published courses get `published_at` now.
pub fn course_insert(id: &str, course: &CourseRequest, created_by: &str) -> Built {
    let published_at: SimpleExpr = if course.is_published {
        now_expr()
    } else {
        opt_str(None)
    };
    Query::insert()
        .into_table(Courses::Table)
        .columns([
            Courses::Id,
            Courses::Title,
            Courses::BriefDescription,
            Courses::CategoryId,
            Courses::ThumbnailUrl,
            Courses::VideoUrl,
            Courses::VideoDurationMinutes,
            Courses::Visibility,
            Courses::PointsReward,
            Courses::IsPublished,
            Courses::PublishedAt,
            Courses::CreatedBy,
        ])
        .values_panic([
            id.into(),
            course.title.as_str().into(),
            course.brief_description.as_str().into(),
            opt_str(course.category_id.as_deref()),
            opt_str(course.thumbnail_url.as_deref()),
            opt_str(course.video_url.as_deref()),
            course.video_duration_minutes.into(),
            course.visibility.as_str().into(),
            course.points_reward.into(),
            course.is_published.into(),
            published_at,
            created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// UPDATE every form field. `published_at` is stamped the first time the
/// course is published and kept afterwards.
pub fn course_update(id: &str, course: &CourseRequest) -> Built {
    Query::update()
        .table(Courses::Table)
        .values([
            (Courses::Title, course.title.as_str().into()),
            (Courses::BriefDescription, course.brief_description.as_str().into()),
            (Courses::CategoryId, opt_str(course.category_id.as_deref())),
            (Courses::ThumbnailUrl, opt_str(course.thumbnail_url.as_deref())),
            (Courses::VideoUrl, opt_str(course.video_url.as_deref())),
            (Courses::VideoDurationMinutes, course.video_duration_minutes.into()),
            (Courses::Visibility, course.visibility.as_str().into()),
            (Courses::PointsReward, course.points_reward.into()),
            (Courses::IsPublished, course.is_published.into()),
            (
                Courses::PublishedAt,
                Expr::cust_with_values(
                    "COALESCE(published_at, CASE WHEN ? THEN datetime('now') END)",
                    [course.is_published],
                ),
            ),
            (Courses::UpdatedAt, now_expr()),
        ])
        .and_where(Expr::col(Courses::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn course_get(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    course_columns(&mut q);
    q.from(Courses::Table)
        .and_where(Expr::col((Courses::Table, Courses::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Catalog listing, newest first. `published` filters on the publish flag.
pub fn course_list(published: Option<bool>, category_id: Option<&str>) -> Built {
    let mut q = Query::select().to_owned();
    course_columns(&mut q);
    q.from(Courses::Table);
    if let Some(published) = published {
        q.and_where(Expr::col((Courses::Table, Courses::IsPublished)).eq(published));
    }
    if let Some(category_id) = category_id {
        q.and_where(Expr::col((Courses::Table, Courses::CategoryId)).eq(category_id));
    }
    q.order_by((Courses::Table, Courses::CreatedAt), Order::Desc)
        .order_by((Courses::Table, Courses::Title), Order::Asc)
        .build(SqliteQueryBuilder)
}

// ── Company assignment ─────────────────────────────────────────────────────

/// Assign a course to a company. An existing pair is left alone, so the
/// affected row count tells whether a new assignment was made.
pub fn company_assign(id: &str, company_id: &str, course_id: &str, assigned_by: &str) -> Built {
    Query::insert()
        .into_table(CompanyCourseAssignments::Table)
        .columns([
            CompanyCourseAssignments::Id,
            CompanyCourseAssignments::CompanyId,
            CompanyCourseAssignments::CourseId,
            CompanyCourseAssignments::AssignedBy,
        ])
        .values_panic([
            id.into(),
            company_id.into(),
            course_id.into(),
            assigned_by.into(),
        ])
        .on_conflict(
            OnConflict::columns([
                CompanyCourseAssignments::CompanyId,
                CompanyCourseAssignments::CourseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Courses assigned to a company, in [`course_columns`] order followed by
/// `assigned_at`.
pub fn company_courses(company_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    course_columns(&mut q);
    q.column((CompanyCourseAssignments::Table, CompanyCourseAssignments::AssignedAt))
        .from(CompanyCourseAssignments::Table)
        .inner_join(
            Courses::Table,
            Expr::col((Courses::Table, Courses::Id))
                .equals((CompanyCourseAssignments::Table, CompanyCourseAssignments::CourseId)),
        )
        .and_where(
            Expr::col((CompanyCourseAssignments::Table, CompanyCourseAssignments::CompanyId))
                .eq(company_id),
        )
        .order_by(
            (CompanyCourseAssignments::Table, CompanyCourseAssignments::AssignedAt),
            Order::Desc,
        )
        .order_by((Courses::Table, Courses::Title), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// The company's assignment of a course.
///
/// Columns: assignment id, is_published, video_duration_minutes.
pub fn company_assignment(company_id: &str, course_id: &str) -> Built {
    Query::select()
        .column((CompanyCourseAssignments::Table, CompanyCourseAssignments::Id))
        .column((Courses::Table, Courses::IsPublished))
        .column((Courses::Table, Courses::VideoDurationMinutes))
        .from(CompanyCourseAssignments::Table)
        .inner_join(
            Courses::Table,
            Expr::col((Courses::Table, Courses::Id))
                .equals((CompanyCourseAssignments::Table, CompanyCourseAssignments::CourseId)),
        )
        .and_where(
            Expr::col((CompanyCourseAssignments::Table, CompanyCourseAssignments::CompanyId))
                .eq(company_id),
        )
        .and_where(
            Expr::col((CompanyCourseAssignments::Table, CompanyCourseAssignments::CourseId))
                .eq(course_id),
        )
        .build(SqliteQueryBuilder)
}

// ── Quizzes ────────────────────────────────────────────────────────────────

/// Column order: id, course_id, title, description, passing_score,
/// time_limit_minutes, max_attempts.
pub fn quiz_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Quizzes::Table, Quizzes::Id))
        .column((Quizzes::Table, Quizzes::CourseId))
        .column((Quizzes::Table, Quizzes::Title))
        .column((Quizzes::Table, Quizzes::Description))
        .column((Quizzes::Table, Quizzes::PassingScore))
        .column((Quizzes::Table, Quizzes::TimeLimitMinutes))
        .column((Quizzes::Table, Quizzes::MaxAttempts))
}

/// Validated quiz settings.
pub struct QuizFields<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub passing_score: f64,
    pub time_limit_minutes: i64,
    pub max_attempts: i64,
}

/// Create the course's quiz, or update it in place when one exists.
pub fn quiz_upsert(id: &str, course_id: &str, quiz: &QuizFields<'_>) -> Built {
    Query::insert()
        .into_table(Quizzes::Table)
        .columns([
            Quizzes::Id,
            Quizzes::CourseId,
            Quizzes::Title,
            Quizzes::Description,
            Quizzes::PassingScore,
            Quizzes::TimeLimitMinutes,
            Quizzes::MaxAttempts,
        ])
        .values_panic([
            id.into(),
            course_id.into(),
            quiz.title.into(),
            opt_str(quiz.description),
            quiz.passing_score.into(),
            quiz.time_limit_minutes.into(),
            quiz.max_attempts.into(),
        ])
        .on_conflict(
            OnConflict::column(Quizzes::CourseId)
                .update_columns([
                    Quizzes::Title,
                    Quizzes::Description,
                    Quizzes::PassingScore,
                    Quizzes::TimeLimitMinutes,
                    Quizzes::MaxAttempts,
                ])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

pub fn quiz_by_course(course_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    quiz_columns(&mut q);
    q.from(Quizzes::Table)
        .and_where(Expr::col((Quizzes::Table, Quizzes::CourseId)).eq(course_id))
        .build(SqliteQueryBuilder)
}

pub fn quiz_get(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    quiz_columns(&mut q);
    q.from(Quizzes::Table)
        .and_where(Expr::col((Quizzes::Table, Quizzes::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Questions ──────────────────────────────────────────────────────────────

/// Column order: id, question_text, question_type, option_a, option_b,
/// option_c, option_d, correct_answers, points, explanation, sort_order.
pub fn question_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((QuizQuestions::Table, QuizQuestions::Id))
        .column((QuizQuestions::Table, QuizQuestions::QuestionText))
        .column((QuizQuestions::Table, QuizQuestions::QuestionType))
        .column((QuizQuestions::Table, QuizQuestions::OptionA))
        .column((QuizQuestions::Table, QuizQuestions::OptionB))
        .column((QuizQuestions::Table, QuizQuestions::OptionC))
        .column((QuizQuestions::Table, QuizQuestions::OptionD))
        .column((QuizQuestions::Table, QuizQuestions::CorrectAnswers))
        .column((QuizQuestions::Table, QuizQuestions::Points))
        .column((QuizQuestions::Table, QuizQuestions::Explanation))
        .column((QuizQuestions::Table, QuizQuestions::SortOrder))
}

/// Validated question values.
pub struct NewQuestion<'a> {
    pub id: &'a str,
    pub quiz_id: &'a str,
    pub question_text: &'a str,
    pub question_type: QuestionType,
    pub options: [Option<&'a str>; 4],
    pub correct_answers: &'a str,
    pub points: i64,
    pub explanation: Option<&'a str>,
    pub sort_order: i64,
}

pub fn question_insert(question: &NewQuestion<'_>) -> Built {
    let [a, b, c, d] = question.options;
    Query::insert()
        .into_table(QuizQuestions::Table)
        .columns([
            QuizQuestions::Id,
            QuizQuestions::QuizId,
            QuizQuestions::QuestionText,
            QuizQuestions::QuestionType,
            QuizQuestions::OptionA,
            QuizQuestions::OptionB,
            QuizQuestions::OptionC,
            QuizQuestions::OptionD,
            QuizQuestions::CorrectAnswers,
            QuizQuestions::Points,
            QuizQuestions::Explanation,
            QuizQuestions::SortOrder,
        ])
        .values_panic([
            question.id.into(),
            question.quiz_id.into(),
            question.question_text.into(),
            question.question_type.as_str().into(),
            opt_str(a),
            opt_str(b),
            opt_str(c),
            opt_str(d),
            question.correct_answers.into(),
            question.points.into(),
            opt_str(question.explanation),
            question.sort_order.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Questions of a quiz in display order.
pub fn questions(quiz_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    question_columns(&mut q);
    q.from(QuizQuestions::Table)
        .and_where(Expr::col((QuizQuestions::Table, QuizQuestions::QuizId)).eq(quiz_id))
        .order_by((QuizQuestions::Table, QuizQuestions::SortOrder), Order::Asc)
        .order_by_expr(Expr::cust("quiz_questions.rowid"), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Sort position after the last question of a quiz.
pub fn next_sort_order(quiz_id: &str) -> Built {
    Query::select()
        .expr(Expr::cust("COALESCE(MAX(sort_order), 0) + 1"))
        .from(QuizQuestions::Table)
        .and_where(Expr::col(QuizQuestions::QuizId).eq(quiz_id))
        .build(SqliteQueryBuilder)
}
