use axum::{Json, extract::State};
use rusqlite::Connection;

use awarenow_api::score::{percentage, round1};
use awarenow_api::{
    AssignmentStatus, CampaignStatus, CompanyDashboardResponse, CompanySummary, CompletionSummary,
    OverdueSummary, PlatformDashboardResponse, db,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::routes::today;
use crate::storage::{Db, sq_query_map, sq_query_row};

const RECENT_COMPLETIONS: u64 = 10;
const COMPANY_SUMMARY: u64 = 5;
const OVERDUE_LIST: u64 = 5;

/// Assignment counts per status.
#[derive(Debug, Default)]
struct StatusCounts {
    assigned: i64,
    in_progress: i64,
    completed: i64,
}

impl StatusCounts {
    fn total(&self) -> i64 {
        self.assigned + self.in_progress + self.completed
    }
}

fn status_counts(conn: &Connection, company_id: Option<&str>) -> Result<StatusCounts, ApiErr> {
    let rows: Vec<(String, i64)> = sq_query_map(
        conn,
        db::dashboard::assignment_status_counts(company_id),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(ApiErr::from_db("assignment counts"))?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match AssignmentStatus::parse(&status) {
            Some(AssignmentStatus::Assigned) => counts.assigned += count,
            Some(AssignmentStatus::InProgress) => counts.in_progress += count,
            Some(AssignmentStatus::Completed) => counts.completed += count,
            None => tracing::warn!(%status, "unknown assignment status in dashboard counts"),
        }
    }
    Ok(counts)
}

/// GET /api/platform/dashboard
pub async fn platform(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<PlatformDashboardResponse>, ApiErr> {
    user.require_platform_admin()?;
    let today = today();
    let conn = db.conn();

    let (total_courses, published_courses, total_companies, avg_quiz_score, total_quiz_attempts): (
        i64,
        i64,
        i64,
        Option<f64>,
        i64,
    ) = sq_query_row(&conn, db::dashboard::platform_totals(), |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })
    .map_err(ApiErr::from_db("platform totals"))?;

    let counts = status_counts(&conn, None)?;
    let overdue_count: i64 =
        sq_query_row(&conn, db::dashboard::overdue_count(None, &today), |row| row.get(0))
            .map_err(ApiErr::from_db("overdue count"))?;

    let company_summary = sq_query_map(
        &conn,
        db::dashboard::company_summary(COMPANY_SUMMARY),
        |row| {
            Ok(CompanySummary {
                name: row.get(0)?,
                employee_count: row.get(1)?,
                completed_courses: row.get(2)?,
            })
        },
    )
    .map_err(ApiErr::from_db("company summary"))?;

    let recent_completions = sq_query_map(
        &conn,
        db::dashboard::recent_completions(RECENT_COMPLETIONS),
        |row| {
            Ok(CompletionSummary {
                employee_email: row.get(0)?,
                company: row.get(1)?,
                course: row.get(2)?,
                completed_date: row.get(3)?,
            })
        },
    )
    .map_err(ApiErr::from_db("recent completions"))?;

    let overdue_list = sq_query_map(
        &conn,
        db::dashboard::overdue_list(&today, OVERDUE_LIST),
        |row| {
            let status: String = row.get(4)?;
            Ok(OverdueSummary {
                assignment_id: row.get(0)?,
                employee_email: row.get(1)?,
                course: row.get(2)?,
                due_date: row.get(3)?,
                status: AssignmentStatus::parse(&status).unwrap_or(AssignmentStatus::Assigned),
            })
        },
    )
    .map_err(ApiErr::from_db("overdue list"))?;

    Ok(Json(PlatformDashboardResponse {
        total_courses,
        published_courses,
        total_companies,
        assigned_count: counts.assigned,
        in_progress_count: counts.in_progress,
        completed_count: counts.completed,
        total_assignments: counts.total(),
        completion_rate: percentage(counts.completed, counts.total()),
        overdue_count,
        company_summary,
        recent_completions,
        overdue_list,
        avg_quiz_score: avg_quiz_score.map(round1).unwrap_or(0.0),
        total_quiz_attempts,
    }))
}

/// GET /api/company/dashboard
pub async fn company(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<CompanyDashboardResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let today = today();
    let conn = db.conn();

    let (employee_count, group_count, avg_awareness_score): (i64, i64, Option<f64>) =
        sq_query_row(&conn, db::dashboard::company_totals(company_id), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("company totals"))?;

    let counts = status_counts(&conn, Some(company_id))?;
    let overdue_count: i64 = sq_query_row(
        &conn,
        db::dashboard::overdue_count(Some(company_id), &today),
        |row| row.get(0),
    )
    .map_err(ApiErr::from_db("overdue count"))?;

    let campaigns: Vec<(String, i64)> =
        sq_query_map(&conn, db::campaigns::status_counts(company_id), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("campaign counts"))?;
    let campaign_count = |wanted: CampaignStatus| {
        campaigns
            .iter()
            .filter(|(status, _)| status == wanted.as_str())
            .map(|(_, count)| *count)
            .sum::<i64>()
    };

    Ok(Json(CompanyDashboardResponse {
        employee_count,
        group_count,
        assigned_count: counts.assigned,
        in_progress_count: counts.in_progress,
        completed_count: counts.completed,
        completion_rate: percentage(counts.completed, counts.total()),
        overdue_count,
        avg_awareness_score: avg_awareness_score.map(round1).unwrap_or(0.0),
        draft_campaigns: campaign_count(CampaignStatus::Draft),
        published_campaigns: campaign_count(CampaignStatus::Published),
        completed_campaigns: campaign_count(CampaignStatus::Completed),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rusqlite::params;

    use awarenow_api::Role;

    use crate::testing::TestApp;

    fn assignment(app: &TestApp, id: &str, employee: &str, status: &str, due: Option<&str>) {
        let completed_at = (status == "completed").then_some("2026-03-01 09:00:00");
        app.db
            .conn()
            .execute(
                "INSERT INTO employee_course_assignments \
                 (id, employee_id, course_id, company_assignment_id, due_date, status, completed_at) \
                 SELECT ?1, ?2, 'basics', company_id || ':basics', ?3, ?4, ?5 \
                 FROM users WHERE id = ?2",
                params![id, employee, due, status, completed_at],
            )
            .expect("seed assignment");
    }

    fn seeded() -> TestApp {
        let app = TestApp::new();
        app.seed_course("basics", 10, true);
        app.seed_course("advanced", 10, false);
        for company in ["acme", "globex"] {
            app.seed_company(company, None);
            app.seed_company_course(company, "basics");
        }
        app.seed_user("root", None, "root@awarenow.test", Role::PlatformAdmin);
        app.seed_user("admin", Some("acme"), "admin@acme.test", Role::CompanyAdmin);
        app.seed_user("ann", Some("acme"), "ann@acme.test", Role::Employee);
        app.seed_user("bob", Some("acme"), "bob@acme.test", Role::Employee);
        app.seed_user("cy", Some("acme"), "cy@acme.test", Role::Employee);
        app.seed_user("gus", Some("globex"), "gus@globex.test", Role::Employee);
        app.seed_group("ops", "acme", &["ann"]);

        assignment(&app, "a1", "ann", "completed", None);
        assignment(&app, "a2", "bob", "in_progress", Some("2020-01-01"));
        assignment(&app, "a3", "cy", "assigned", Some("2999-01-01"));
        assignment(&app, "a4", "gus", "assigned", Some("2020-06-01"));
        app.db
            .conn()
            .execute(
                "UPDATE employee_profiles SET awareness_score = CASE user_id \
                 WHEN 'ann' THEN 80 WHEN 'bob' THEN 45 ELSE 0 END",
                [],
            )
            .expect("scores");
        app
    }

    #[tokio::test]
    async fn platform_dashboard_spans_every_company() {
        let app = seeded();
        let root = app.token("root", Role::PlatformAdmin);
        let (status, body) = app
            .call(Method::GET, "/api/platform/dashboard", Some(&root), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["total_courses"], 2);
        assert_eq!(body["published_courses"], 1);
        assert_eq!(body["total_companies"], 2);
        assert_eq!(body["total_assignments"], 4);
        assert_eq!(body["completed_count"], 1);
        assert_eq!(body["assigned_count"], 2);
        assert_eq!(body["completion_rate"], 25.0);
        assert_eq!(body["overdue_count"], 2);
        assert_eq!(body["overdue_list"][0]["assignment_id"], "a2");
        assert_eq!(body["recent_completions"][0]["employee_email"], "ann@acme.test");
        assert_eq!(body["company_summary"][0]["employee_count"], 3);
        assert_eq!(body["company_summary"][0]["completed_courses"], 1);
        assert_eq!(body["avg_quiz_score"], 0.0);
    }

    #[tokio::test]
    async fn company_dashboard_is_scoped_to_the_caller() {
        let app = seeded();
        let admin = app.token("admin", Role::CompanyAdmin);
        let (status, body) = app
            .call(Method::GET, "/api/company/dashboard", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["employee_count"], 3);
        assert_eq!(body["group_count"], 1);
        assert_eq!(body["assigned_count"], 1);
        assert_eq!(body["in_progress_count"], 1);
        assert_eq!(body["completed_count"], 1);
        assert_eq!(body["completion_rate"], 33.3);
        assert_eq!(body["overdue_count"], 1);
        assert_eq!(body["avg_awareness_score"], 41.7);
        assert_eq!(body["draft_campaigns"], 0);
    }
}
