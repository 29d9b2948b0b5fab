use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
};

use awarenow_api::{
    ActivateRequest, AuthTokenResponse, CompanyStatus, LoginRequest, LogoutRequest, OkResponse,
    RefreshRequest, Role, UserResponse, crypto, db, service,
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mailer::Mailer;
use crate::routes::now_unix;
use crate::storage::{
    Db, company_from_row, sq_execute, sq_query_map, sq_query_opt, sq_query_row, user_from_row,
};

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
///
/// The role and company come from the database, not from the token, so a
/// disabled or demoted account loses access immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: Role,
    pub email: String,
}

impl AuthUser {
    pub fn require_platform_admin(&self) -> Result<(), ApiErr> {
        match self.role {
            Role::PlatformAdmin => Ok(()),
            _ => Err(ApiErr::forbidden("platform administrator only")),
        }
    }

    /// Company of a company administrator.
    pub fn company_admin_scope(&self) -> Result<&str, ApiErr> {
        match (self.role, self.company_id.as_deref()) {
            (Role::CompanyAdmin, Some(company_id)) => Ok(company_id),
            _ => Err(ApiErr::forbidden("company administrator only")),
        }
    }

    /// Company of an employee.
    pub fn employee_scope(&self) -> Result<&str, ApiErr> {
        match (self.role, self.company_id.as_deref()) {
            (Role::Employee, Some(company_id)) => Ok(company_id),
            _ => Err(ApiErr::forbidden("employees only")),
        }
    }

    /// Platform or company administrators.
    pub fn require_admin(&self) -> Result<(), ApiErr> {
        match self.role {
            Role::PlatformAdmin | Role::CompanyAdmin => Ok(()),
            Role::Employee => Err(ApiErr::forbidden("administrators only")),
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiErr::unauthorized("missing or invalid Authorization header"))?;

        let config = AppConfig::from_ref(state);
        let claims = crypto::verify_jwt(token, &config.jwt_secret, now_unix())?;

        let db = Db::from_ref(state);
        let conn = db.conn();
        let row = sq_query_opt(&conn, db::users::auth_lookup(&claims.user_id), |row| {
            Ok((
                AuthUser {
                    user_id: row.get(0)?,
                    company_id: row.get(1)?,
                    role: Role::parse(&row.get::<_, String>(2)?).unwrap_or(Role::Employee),
                    email: row.get(3)?,
                },
                row.get::<_, bool>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })
        .map_err(ApiErr::from_db("auth lookup"))?;

        match row {
            Some((user, true, false)) => Ok(user),
            Some(_) => Err(ApiErr::unauthorized("account is not active")),
            None => Err(ApiErr::unauthorized("unknown user")),
        }
    }
}

// ---------------------------------------------------------------------------
// Token issuing
// ---------------------------------------------------------------------------

fn issue_tokens(
    conn: &rusqlite::Connection,
    config: &AppConfig,
    user_id: &str,
    email: &str,
    role: Role,
) -> Result<AuthTokenResponse, ApiErr> {
    let bundle =
        service::prepare_token_bundle(&config.jwt_secret, user_id, email, role, now_unix())?;
    sq_execute(
        conn,
        db::users::refresh_insert(&bundle.token_id, user_id, &bundle.token_hash, &bundle.expires_at),
    )
    .map_err(ApiErr::from_db("store refresh token"))?;
    Ok(bundle.response)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

struct LoginCandidate {
    id: String,
    company_id: Option<String>,
    role: Role,
    password_hash: Option<String>,
    password_salt: Option<String>,
    is_active: bool,
}

/// POST /api/auth/login — email + password login.
pub async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let email = service::validate_email(&req.email)?;
    let invalid = || ApiErr::unauthorized("invalid email or password");

    let mut candidates = {
        let conn = db.conn();
        sq_query_map(&conn, db::users::login_candidates(&email), |row| {
            Ok(LoginCandidate {
                id: row.get(0)?,
                company_id: row.get(1)?,
                role: Role::parse(&row.get::<_, String>(2)?).unwrap_or(Role::Employee),
                password_hash: row.get(3)?,
                password_salt: row.get(4)?,
                is_active: row.get(5)?,
            })
        })
        .map_err(ApiErr::from_db("login lookup"))?
    };

    if let Some(company_id) = req.company_id.as_deref().filter(|c| !c.is_empty()) {
        candidates.retain(|c| c.company_id.as_deref() == Some(company_id));
    } else if candidates.iter().filter(|c| c.is_active).count() > 1 {
        return Err(ApiErr::conflict(
            "this email belongs to more than one company; specify company_id",
        ));
    }

    // Prefer the active account when an inactive duplicate exists.
    candidates.sort_by_key(|c| !c.is_active);
    let user = candidates.into_iter().next().ok_or_else(invalid)?;

    let (Some(hash), Some(salt)) = (&user.password_hash, &user.password_salt) else {
        return Err(ApiErr::unauthorized("account is not activated"));
    };
    // Password hashing runs without holding the connection lock.
    if !crypto::verify_password(&req.password, hash, salt) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiErr::unauthorized("account is not activated"));
    }

    let conn = db.conn();
    if let Some(company_id) = &user.company_id {
        let company = sq_query_row(&conn, db::companies::get_by_id(company_id), company_from_row)
            .map_err(ApiErr::from_db("login company lookup"))?;
        if company.status != CompanyStatus::Active {
            return Err(ApiErr::forbidden(format!(
                "company license is {}",
                company.status.as_str().to_lowercase()
            )));
        }
    }

    let tokens = issue_tokens(&conn, &config, &user.id, &email, user.role)?;
    tracing::info!(user_id = %user.id, role = %user.role, "login");
    Ok(Json(tokens))
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/refresh — rotate the refresh token.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = db.conn();

    let user_id: String = sq_query_opt(&conn, db::users::refresh_lookup(&token_hash), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("refresh lookup"))?
    .ok_or_else(|| ApiErr::unauthorized("invalid refresh token"))?;

    sq_execute(&conn, db::users::refresh_delete(&token_hash))
        .map_err(ApiErr::from_db("rotate refresh token"))?;

    let (email, role, usable): (String, String, bool) =
        sq_query_row(&conn, db::users::auth_lookup(&user_id), |row| {
            Ok((
                row.get(3)?,
                row.get(2)?,
                row.get::<_, bool>(4)? && !row.get::<_, bool>(5)?,
            ))
        })
        .map_err(ApiErr::from_db("refresh user lookup"))?;
    if !usable {
        return Err(ApiErr::unauthorized("account is not active"));
    }
    let role = Role::parse(&role).ok_or_else(|| ApiErr::internal("internal server error"))?;

    Ok(Json(issue_tokens(&conn, &config, &user_id, &email, role)?))
}

/// POST /api/auth/logout — revoke a refresh token.
pub async fn logout(
    State(db): State<Db>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = db.conn();
    sq_execute(&conn, db::users::refresh_delete(&token_hash))
        .map_err(ApiErr::from_db("logout"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Me
// ---------------------------------------------------------------------------

pub async fn me(State(db): State<Db>, user: AuthUser) -> Result<Json<UserResponse>, ApiErr> {
    let conn = db.conn();
    sq_query_row(&conn, db::users::get_by_id(&user.user_id), user_from_row)
        .map(Json)
        .map_err(ApiErr::from_db("me"))
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// POST /api/auth/activate — set the first password of an invited account.
pub async fn activate(
    State(db): State<Db>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    service::validate_password(&req.password)?;
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiErr::bad_request("invalid or expired activation token"));
    }

    let user_id: String = {
        let conn = db.conn();
        sq_query_opt(&conn, db::users::get_by_activation_token(token), |row| row.get(0))
            .map_err(ApiErr::from_db("activation lookup"))?
            .ok_or_else(|| ApiErr::bad_request("invalid or expired activation token"))?
    };

    let (hash, salt) = crypto::hash_password(&req.password)?;
    let conn = db.conn();
    sq_execute(&conn, db::users::activate(&user_id, &hash, &salt))
        .map_err(ApiErr::from_db("activate user"))?;
    tracing::info!(%user_id, "account activated");
    Ok(Json(OkResponse { ok: true }))
}

/// Mail an activation link. Failures are logged; the account stays pending
/// and can be re-invited.
pub(crate) async fn send_activation_email(
    mailer: &Mailer,
    config: &AppConfig,
    to: &str,
    first_name: &str,
    token: &str,
) -> bool {
    let link = format!(
        "{}/activate?token={}",
        config.base_url,
        urlencoding::encode(token)
    );
    let name = awarenow_api::render::escape_html(if first_name.is_empty() {
        to
    } else {
        first_name
    });
    let html = format!(
        "<p>Hello {name},</p>\
         <p>An AwareNow account has been created for you. \
         Choose a password to activate it:</p>\
         <p><a href=\"{link}\">{link}</a></p>",
        link = awarenow_api::render::escape_html(&link),
    );
    match mailer
        .send(to, "Activate your AwareNow account", &html, None)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("activation mail to {to} failed: {e:#}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Create the first platform administrator from the environment when none
/// exists yet.
pub fn bootstrap_platform_admin(db: &Db, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = service::validate_email(email)?;
    service::validate_password(password)?;

    let conn = db.conn();
    let existing: i64 = sq_query_row(&conn, db::users::count_platform_admins(), |row| row.get(0))?;
    if existing > 0 {
        return Ok(());
    }

    let (hash, salt) = crypto::hash_password(password)?;
    let id = service::new_id();
    sq_execute(
        &conn,
        db::users::insert(&db::users::NewUser {
            id: &id,
            company_id: None,
            email: &email,
            first_name: "Platform",
            last_name: "Admin",
            role: Role::PlatformAdmin,
            department: None,
            job_title: None,
            phone_number: None,
            password_hash: Some(&hash),
            password_salt: Some(&salt),
            is_active: true,
            activation_token: None,
        }),
    )?;
    tracing::info!("created platform administrator {email}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use awarenow_api::Role;

    use crate::testing::TestApp;

    fn activation_token(html: &str) -> String {
        let start = html.find("token=").expect("activation link") + "token=".len();
        html[start..]
            .chars()
            .take_while(char::is_ascii_hexdigit)
            .collect()
    }

    #[tokio::test]
    async fn requests_without_a_valid_bearer_token_are_rejected() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = app
            .call(Method::GET, "/api/auth/me", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn roles_guard_their_surfaces() {
        let app = TestApp::new();
        app.seed_company("acme", None);
        app.seed_user("root", None, "root@awarenow.test", Role::PlatformAdmin);
        app.seed_user("admin", Some("acme"), "admin@acme.test", Role::CompanyAdmin);
        app.seed_user("emp", Some("acme"), "emp@acme.test", Role::Employee);
        let root = app.token("root", Role::PlatformAdmin);
        let admin = app.token("admin", Role::CompanyAdmin);
        let emp = app.token("emp", Role::Employee);

        for (uri, allowed, denied) in [
            ("/api/platform/companies", &root, &admin),
            ("/api/platform/dashboard", &root, &emp),
            ("/api/company/users", &admin, &emp),
            ("/api/company/users", &admin, &root),
            ("/api/me/assignments", &emp, &admin),
            ("/api/templates", &admin, &emp),
        ] {
            let (status, _) = app.call(Method::GET, uri, Some(allowed), None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            let (status, _) = app.call(Method::GET, uri, Some(denied), None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        }

        app.db
            .conn()
            .execute("UPDATE users SET is_disabled = 1 WHERE id = 'emp'", [])
            .expect("disable");
        let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&emp), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invited_user_activates_and_logs_in() {
        let app = TestApp::new();
        app.seed_company("acme", None);
        app.seed_user("admin", Some("acme"), "admin@acme.test", Role::CompanyAdmin);
        let admin = app.token("admin", Role::CompanyAdmin);

        let (status, invited) = app
            .call(
                Method::POST,
                "/api/company/users",
                Some(&admin),
                Some(json!({
                    "first_name": "Dana",
                    "last_name": "Smith",
                    "email": "dana@acme.test",
                    "role": "EMPLOYEE",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{invited}");
        assert_eq!(invited["activation_sent"], true);
        assert_eq!(invited["user"]["is_active"], false);

        let mail = app.sent_mail();
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].to, "dana@acme.test");
        assert!(mail[0].html.contains("https://awareness.test/activate?token="));
        let token = activation_token(&mail[0].html);
        assert_eq!(token.len(), 64);

        let login = json!({ "email": "dana@acme.test", "password": "correct horse" });
        let (status, _) = app
            .call(Method::POST, "/api/auth/login", None, Some(login.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/activate",
                None,
                Some(json!({ "token": token, "password": "short" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/activate",
                None,
                Some(json!({ "token": token, "password": "correct horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/activate",
                None,
                Some(json!({ "token": token, "password": "another secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "dana@acme.test", "password": "wrong horse" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, tokens) = app
            .call(Method::POST, "/api/auth/login", None, Some(login))
            .await;
        assert_eq!(status, StatusCode::OK, "{tokens}");
        assert_eq!(tokens["role"], "EMPLOYEE");
        let access = tokens["access_token"].as_str().expect("access token");
        let (status, me) = app.call(Method::GET, "/api/auth/me", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "dana@acme.test");

        let refresh = json!({ "refresh_token": tokens["refresh_token"] });
        let (status, rotated) = app
            .call(Method::POST, "/api/auth/refresh", None, Some(refresh.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(rotated["refresh_token"], tokens["refresh_token"]);
        let (status, _) = app
            .call(Method::POST, "/api/auth/refresh", None, Some(refresh))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shared_email_needs_a_company_to_log_in() {
        let app = TestApp::new();
        app.seed_company("acme", None);
        app.seed_company("globex", None);
        app.seed_user("a", Some("acme"), "pat@example.test", Role::Employee);
        app.seed_user("g", Some("globex"), "pat@example.test", Role::Employee);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "pat@example.test", "password": "whatever1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Seeded accounts have no password yet.
        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({
                    "email": "pat@example.test",
                    "password": "whatever1",
                    "company_id": "globex",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "account is not activated");
    }
}
