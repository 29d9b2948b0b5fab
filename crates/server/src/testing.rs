//! Router-level test fixture: an in-memory database, a captured outbox, and
//! helpers to seed rows and call endpoints.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use rusqlite::params;
use serde_json::Value;
use tower::ServiceExt;

use awarenow_api::{Role, crypto, db::groups::SYSTEM_GROUP_NAME};

use crate::app::{self, AppState};
use crate::config::AppConfig;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::routes::now_unix;
use crate::storage::{self, Db};

pub const BASE_URL: &str = "https://awareness.test";

fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some("test-secret".into()),
        "BASE_URL" => Some(BASE_URL.into()),
        _ => None,
    })
    .expect("test config")
}

pub struct TestApp {
    pub db: Db,
    pub config: AppConfig,
    outbox: Arc<Mutex<Vec<OutgoingEmail>>>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let (mailer, outbox) = Mailer::memory();
        Self::with_mailer(mailer, outbox)
    }

    /// Mail is only logged; the outbox stays empty.
    pub fn log_only() -> Self {
        let config = test_config();
        let mailer = Mailer::Log {
            from: config.mail_from,
        };
        Self::with_mailer(mailer, Arc::default())
    }

    fn with_mailer(mailer: Mailer, outbox: Arc<Mutex<Vec<OutgoingEmail>>>) -> Self {
        let db = storage::open_in_memory().expect("in-memory database");
        let config = test_config();
        let router = app::router(AppState {
            db: db.clone(),
            config: config.clone(),
            mailer,
        });
        Self {
            db,
            config,
            outbox,
            router,
        }
    }

    /// Access token for a seeded user, skipping the password round trip.
    pub fn token(&self, user_id: &str, role: Role) -> String {
        crypto::sign_jwt(user_id, role, &self.config.jwt_secret, now_unix())
    }

    pub fn sent_mail(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("router is infallible")
    }

    /// Call an endpoint and decode its JSON body (`Null` when not JSON).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    // -- seeding ------------------------------------------------------------

    fn exec(&self, sql: &str, params: impl rusqlite::Params) {
        self.db.conn().execute(sql, params).expect("seed statement");
    }

    pub fn seed_plan(&self, id: &str, max_users: i64) {
        self.exec(
            "INSERT INTO subscription_plans (id, name, max_users) VALUES (?1, ?1, ?2)",
            params![id, max_users],
        );
    }

    /// An active company with its system group `{id}-all`.
    pub fn seed_company(&self, id: &str, plan_id: Option<&str>) {
        self.exec(
            "INSERT INTO companies (id, name, email_domain, subscription_plan_id) \
             VALUES (?1, ?1, ?2, ?3)",
            params![id, format!("{id}.test"), plan_id],
        );
        self.exec(
            "INSERT INTO company_groups (id, company_id, name, is_system) VALUES (?1, ?2, ?3, 1)",
            params![format!("{id}-all"), id, SYSTEM_GROUP_NAME],
        );
    }

    /// An activated user without a password. Company users join the system
    /// group; employees get a profile.
    pub fn seed_user(&self, id: &str, company_id: Option<&str>, email: &str, role: Role) {
        self.exec(
            "INSERT INTO users (id, company_id, email, first_name, last_name, role, is_active) \
             VALUES (?1, ?2, ?3, ?1, 'Test', ?4, 1)",
            params![id, company_id, email, role.as_str()],
        );
        if let Some(company_id) = company_id {
            self.exec(
                "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                params![format!("{company_id}-all"), id],
            );
        }
        if role == Role::Employee {
            self.exec("INSERT INTO employee_profiles (user_id) VALUES (?1)", params![id]);
        }
    }

    pub fn seed_group(&self, id: &str, company_id: &str, members: &[&str]) {
        self.exec(
            "INSERT INTO company_groups (id, company_id, name) VALUES (?1, ?2, ?1)",
            params![id, company_id],
        );
        for member in members {
            self.exec(
                "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                params![id, member],
            );
        }
    }

    pub fn seed_course(&self, id: &str, minutes: i64, published: bool) {
        self.exec(
            "INSERT INTO courses (id, title, video_duration_minutes, is_published) \
             VALUES (?1, ?1, ?2, ?3)",
            params![id, minutes, published],
        );
    }

    /// Quiz `{course_id}-quiz` with one single-answer question per entry of
    /// `answers` (question ids `q1`, `q2`, ...), one point each.
    pub fn seed_quiz(&self, course_id: &str, passing_score: f64, max_attempts: i64, answers: &[&str]) {
        let quiz_id = format!("{course_id}-quiz");
        self.exec(
            "INSERT INTO quizzes (id, course_id, title, passing_score, max_attempts) \
             VALUES (?1, ?2, 'Check', ?3, ?4)",
            params![quiz_id, course_id, passing_score, max_attempts],
        );
        for (i, answer) in answers.iter().enumerate() {
            self.exec(
                "INSERT INTO quiz_questions (id, quiz_id, question_text, question_type, \
                 option_a, option_b, correct_answers, sort_order) \
                 VALUES (?1, ?2, 'Pick one', 'multiple_choice', 'Yes', 'No', ?3, ?4)",
                params![format!("q{}", i + 1), quiz_id, answer, i as i64],
            );
        }
    }

    pub fn seed_company_course(&self, company_id: &str, course_id: &str) {
        self.exec(
            "INSERT INTO company_course_assignments (id, company_id, course_id) \
             VALUES (?1 || ':' || ?2, ?1, ?2)",
            params![company_id, course_id],
        );
    }

    pub fn seed_template(&self, id: &str, subject: &str, html: &str) {
        self.exec(
            "INSERT INTO email_templates (id, name, subject, html_content) VALUES (?1, ?1, ?2, ?3)",
            params![id, subject, html],
        );
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.db
            .conn()
            .query_row(sql, [], |row| row.get(0))
            .expect("count query")
    }
}
