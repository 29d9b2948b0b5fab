use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use awarenow_api::db::companies::{CompanyChanges, NewCompany};
use awarenow_api::db::groups::SYSTEM_GROUP_NAME;
use awarenow_api::{
    CompanyResponse, CreateCompanyAdminRequest, CreateCompanyRequest, CreatePlanRequest,
    InvitedUserResponse, ListCompaniesResponse, ListPlansResponse, PlanResponse, Role,
    UpdateCompanyRequest, db, service,
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mailer::Mailer;
use crate::routes::auth::{AuthUser, send_activation_email};
use crate::routes::company::{Invite, invite_user};
use crate::storage::{
    Db, company_from_row, is_constraint_violation, plan_from_row, sq_execute, sq_query_map,
    sq_query_opt, sq_query_row,
};

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// POST /api/platform/plans
pub async fn create_plan(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanResponse>), ApiErr> {
    user.require_platform_admin()?;
    let name = service::validate_name("name", &req.name, 100)?;
    if req.max_users < 1 {
        return Err(ApiErr::bad_request("max_users must be at least 1"));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiErr::bad_request("price must not be negative"));
    }

    let id = service::new_id();
    let conn = db.conn();
    sq_execute(
        &conn,
        db::companies::plan_insert(&id, &name, req.max_users, req.price, req.has_platform_support),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("a plan with this name already exists")
        } else {
            ApiErr::from_db("create plan")(e)
        }
    })?;

    let plan = sq_query_row(&conn, db::companies::plan_get(&id), plan_from_row)
        .map_err(ApiErr::from_db("reload plan"))?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// GET /api/platform/plans
pub async fn list_plans(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListPlansResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let plans = sq_query_map(&conn, db::companies::plan_list(), plan_from_row)
        .map_err(ApiErr::from_db("list plans"))?;
    Ok(Json(ListPlansResponse { plans }))
}

fn ensure_plan_exists(conn: &rusqlite::Connection, plan_id: &str) -> Result<(), ApiErr> {
    sq_query_opt(conn, db::companies::plan_get(plan_id), plan_from_row)
        .map_err(ApiErr::from_db("plan lookup"))?
        .map(|_| ())
        .ok_or_else(|| ApiErr::bad_request("unknown subscription plan"))
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

/// POST /api/platform/companies — create a tenant and its "All Users" group.
pub async fn create_company(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CompanyResponse>), ApiErr> {
    user.require_platform_admin()?;
    let name = service::validate_name("name", &req.name, 200)?;
    let email_domain = service::validate_email_domain(&req.email_domain)?;
    let plan_id = service::non_blank(req.subscription_plan_id.as_deref());
    let start = service::validate_optional_date("license_start_date", req.license_start_date.as_deref())?;
    let end = service::validate_optional_date("license_end_date", req.license_end_date.as_deref())?;
    service::validate_license_window(start.as_deref(), end.as_deref())?;

    let id = service::new_id();
    let mut conn = db.conn();
    if let Some(plan_id) = &plan_id {
        ensure_plan_exists(&conn, plan_id)?;
    }

    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    sq_execute(
        &tx,
        db::companies::insert(&NewCompany {
            id: &id,
            name: &name,
            email_domain: &email_domain,
            subscription_plan_id: plan_id.as_deref(),
            license_start_date: start.as_deref(),
            license_end_date: end.as_deref(),
        }),
    )
    .map_err(ApiErr::from_db("create company"))?;
    sq_execute(
        &tx,
        db::groups::insert(
            &service::new_id(),
            &id,
            SYSTEM_GROUP_NAME,
            Some("Every user of the company"),
            true,
        ),
    )
    .map_err(ApiErr::from_db("create system group"))?;
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    let company = sq_query_row(&conn, db::companies::get_by_id(&id), company_from_row)
        .map_err(ApiErr::from_db("reload company"))?;
    tracing::info!(company_id = %id, "company created");
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/platform/companies
pub async fn list_companies(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListCompaniesResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let companies = sq_query_map(&conn, db::companies::list(), company_from_row)
        .map_err(ApiErr::from_db("list companies"))?;
    Ok(Json(ListCompaniesResponse { companies }))
}

fn load_company(conn: &rusqlite::Connection, id: &str) -> Result<CompanyResponse, ApiErr> {
    sq_query_opt(conn, db::companies::get_by_id(id), company_from_row)
        .map_err(ApiErr::from_db("company lookup"))?
        .ok_or_else(|| ApiErr::not_found("company not found"))
}

/// GET /api/platform/companies/:id
pub async fn get_company(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CompanyResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load_company(&conn, &id).map(Json)
}

/// PUT /api/platform/companies/:id — name, plan, license window, status.
pub async fn update_company(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<CompanyResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    let current = load_company(&conn, &id)?;

    let changes = CompanyChanges {
        name: req
            .name
            .as_deref()
            .map(|n| service::validate_name("name", n, 200))
            .transpose()?,
        subscription_plan_id: service::non_blank(req.subscription_plan_id.as_deref()),
        license_start_date: service::validate_optional_date(
            "license_start_date",
            req.license_start_date.as_deref(),
        )?,
        license_end_date: service::validate_optional_date(
            "license_end_date",
            req.license_end_date.as_deref(),
        )?,
        status: req.status,
    };
    if changes.is_empty() {
        return Ok(Json(current));
    }
    if let Some(plan_id) = &changes.subscription_plan_id {
        ensure_plan_exists(&conn, plan_id)?;
    }
    service::validate_license_window(
        changes
            .license_start_date
            .as_deref()
            .or(current.license_start_date.as_deref()),
        changes
            .license_end_date
            .as_deref()
            .or(current.license_end_date.as_deref()),
    )?;

    sq_execute(&conn, db::companies::update(&id, &changes))
        .map_err(ApiErr::from_db("update company"))?;
    if let Some(status) = changes.status.filter(|s| *s != current.status) {
        tracing::info!(company_id = %id, "company status {} -> {status}", current.status);
    }
    load_company(&conn, &id).map(Json)
}

// ---------------------------------------------------------------------------
// Company administrators
// ---------------------------------------------------------------------------

/// POST /api/platform/companies/:id/admins — invite a company administrator.
pub async fn create_company_admin(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Mailer>,
    user: AuthUser,
    Path(company_id): Path<String>,
    Json(req): Json<CreateCompanyAdminRequest>,
) -> Result<(StatusCode, Json<InvitedUserResponse>), ApiErr> {
    user.require_platform_admin()?;
    let email = service::validate_email(&req.email)?;
    let first_name = service::non_blank(req.first_name.as_deref()).unwrap_or_default();
    let last_name = service::non_blank(req.last_name.as_deref()).unwrap_or_default();

    let (created, token) = {
        let mut conn = db.conn();
        load_company(&conn, &company_id)?;
        invite_user(
            &mut conn,
            &Invite {
                company_id: &company_id,
                email: &email,
                first_name: &first_name,
                last_name: &last_name,
                role: Role::CompanyAdmin,
                department: None,
                job_title: None,
                phone_number: None,
                group_ids: &[],
            },
        )?
    };

    let activation_sent =
        send_activation_email(&mailer, &config, &created.email, &created.first_name, &token).await;
    Ok((
        StatusCode::CREATED,
        Json(InvitedUserResponse {
            user: created,
            activation_sent,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rusqlite::params;
    use serde_json::json;

    use awarenow_api::{Role, crypto};

    use crate::testing::TestApp;

    fn platform() -> (TestApp, String) {
        let app = TestApp::new();
        app.seed_user("root", None, "root@awarenow.test", Role::PlatformAdmin);
        let root = app.token("root", Role::PlatformAdmin);
        (app, root)
    }

    #[tokio::test]
    async fn onboarding_a_company() {
        let (app, root) = platform();

        let (status, _) = app
            .call(
                Method::POST,
                "/api/platform/plans",
                Some(&root),
                Some(json!({ "name": "Starter", "max_users": 0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, plan) = app
            .call(
                Method::POST,
                "/api/platform/plans",
                Some(&root),
                Some(json!({ "name": "Starter", "max_users": 25, "price": 49.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let plan_id = plan["id"].as_str().expect("plan id").to_string();

        let (status, err) = app
            .call(
                Method::POST,
                "/api/platform/companies",
                Some(&root),
                Some(json!({ "name": "Acme", "email_domain": "not a domain" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "Enter a valid domain (example: company.com)");

        let (status, _) = app
            .call(
                Method::POST,
                "/api/platform/companies",
                Some(&root),
                Some(json!({
                    "name": "Acme",
                    "email_domain": "acme.test",
                    "license_start_date": "2026-06-01",
                    "license_end_date": "2026-01-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, company) = app
            .call(
                Method::POST,
                "/api/platform/companies",
                Some(&root),
                Some(json!({
                    "name": "Acme",
                    "email_domain": "ACME.test",
                    "subscription_plan_id": plan_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{company}");
        assert_eq!(company["status"], "ACTIVE");
        assert_eq!(company["email_domain"], "acme.test");
        let company_id = company["id"].as_str().expect("company id").to_string();
        assert_eq!(
            app.count(&format!(
                "SELECT COUNT(*) FROM company_groups WHERE company_id = '{company_id}' AND is_system = 1"
            )),
            1
        );

        let (status, invited) = app
            .call(
                Method::POST,
                &format!("/api/platform/companies/{company_id}/admins"),
                Some(&root),
                Some(json!({ "email": "boss@acme.test", "first_name": "Bea" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{invited}");
        assert_eq!(invited["user"]["role"], "COMPANY_ADMIN");
        assert_eq!(app.sent_mail().len(), 1);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/platform/companies/missing/admins",
                Some(&root),
                Some(json!({ "email": "boss@acme.test" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn suspended_companies_cannot_log_in() {
        let (app, root) = platform();
        app.seed_company("acme", None);
        app.seed_user("emp", Some("acme"), "emp@acme.test", Role::Employee);
        let (hash, salt) = crypto::hash_password("s3cret-pass").expect("hash");
        app.db
            .conn()
            .execute(
                "UPDATE users SET password_hash = ?1, password_salt = ?2 WHERE id = 'emp'",
                params![hash, salt],
            )
            .expect("set password");

        let (status, company) = app
            .call(
                Method::PUT,
                "/api/platform/companies/acme",
                Some(&root),
                Some(json!({ "status": "SUSPENDED" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(company["status"], "SUSPENDED");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "emp@acme.test", "password": "s3cret-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "company license is suspended");
    }
}
