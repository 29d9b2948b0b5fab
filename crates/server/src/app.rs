use axum::{
    Router,
    extract::FromRef,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::routes;
use crate::storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub mailer: Mailer,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Mailer {
    fn from_ref(state: &AppState) -> Self {
        state.mailer.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/activate", post(routes::auth::activate))
        // Platform: plans & companies
        .route(
            "/platform/plans",
            post(routes::platform::create_plan).get(routes::platform::list_plans),
        )
        .route(
            "/platform/companies",
            post(routes::platform::create_company).get(routes::platform::list_companies),
        )
        .route(
            "/platform/companies/{id}",
            get(routes::platform::get_company).put(routes::platform::update_company),
        )
        .route(
            "/platform/companies/{id}/admins",
            post(routes::platform::create_company_admin),
        )
        .route("/platform/dashboard", get(routes::dashboard::platform))
        // Platform: catalog
        .route(
            "/platform/categories",
            post(routes::courses::create_category).get(routes::courses::list_categories),
        )
        .route(
            "/platform/courses",
            post(routes::courses::create_course).get(routes::courses::list_courses),
        )
        .route(
            "/platform/courses/{id}",
            get(routes::courses::get_course).put(routes::courses::update_course),
        )
        .route(
            "/platform/courses/{id}/assign",
            post(routes::courses::assign_to_companies),
        )
        .route(
            "/platform/courses/{id}/quiz",
            put(routes::courses::upsert_quiz).get(routes::courses::get_quiz),
        )
        .route(
            "/platform/quizzes/{id}/questions",
            post(routes::courses::add_question),
        )
        // Company administration
        .route(
            "/company/users",
            post(routes::company::create_user).get(routes::company::list_users),
        )
        .route(
            "/company/users/{id}/disable",
            post(routes::company::disable_user),
        )
        .route(
            "/company/groups",
            post(routes::company::create_group).get(routes::company::list_groups),
        )
        .route(
            "/company/groups/{id}",
            get(routes::company::get_group).delete(routes::company::delete_group),
        )
        .route(
            "/company/groups/{id}/members",
            post(routes::company::add_members),
        )
        .route(
            "/company/groups/{id}/members/{user_id}",
            delete(routes::company::remove_member),
        )
        .route("/company/courses", get(routes::courses::company_courses))
        .route(
            "/company/courses/{course_id}/assign",
            post(routes::courses::assign_to_employees),
        )
        .route("/company/dashboard", get(routes::dashboard::company))
        // Employee learning
        .route("/me/assignments", get(routes::learning::list_assignments))
        .route("/me/assignments/{id}", get(routes::learning::get_assignment))
        .route(
            "/me/assignments/{id}/watch",
            post(routes::learning::record_watch),
        )
        .route(
            "/me/assignments/{id}/quiz",
            get(routes::learning::get_quiz).post(routes::learning::submit_quiz),
        )
        .route("/me/certificates", get(routes::learning::list_certificates))
        .route("/me/profile", get(routes::learning::profile))
        .route(
            "/certificates/verify/{token}",
            get(routes::learning::verify_certificate),
        )
        // Email templates
        .route(
            "/templates",
            post(routes::templates::create).get(routes::templates::list),
        )
        .route("/templates/{id}", put(routes::templates::update))
        .route(
            "/templates/{id}/deactivate",
            post(routes::templates::deactivate),
        )
        .route("/templates/{id}/preview", get(routes::templates::preview))
        // Campaigns
        .route(
            "/campaigns",
            post(routes::campaigns::create).get(routes::campaigns::list),
        )
        .route(
            "/campaigns/{id}",
            get(routes::campaigns::get).put(routes::campaigns::update),
        )
        .route("/campaigns/{id}/publish", post(routes::campaigns::publish))
        .route("/campaigns/{id}/complete", post(routes::campaigns::complete))
        .route("/campaigns/{id}/report", get(routes::campaigns::report));

    // Token-addressed tracking links embedded in campaign mail
    let tracking = Router::new()
        .route("/open/{token}", get(routes::tracking::open))
        .route("/click/{token}", get(routes::tracking::click))
        .route("/landing/{token}", get(routes::tracking::landing))
        .route(
            "/fall/{token}",
            get(routes::tracking::fall).post(routes::tracking::fall),
        );

    Router::new()
        .nest("/api", api)
        .nest("/t", tracking)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
