use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};
use rusqlite::Connection;

use awarenow_api::db::campaigns::TemplateFields;
use awarenow_api::render;
use awarenow_api::{ListTemplatesResponse, TemplateRequest, TemplateResponse, db, service};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_execute, sq_query_map, sq_query_opt, template_from_row};

pub(crate) fn load_template(conn: &Connection, id: &str) -> Result<TemplateResponse, ApiErr> {
    sq_query_opt(conn, db::campaigns::template_get(id), template_from_row)
        .map_err(ApiErr::from_db("template lookup"))?
        .ok_or_else(|| ApiErr::not_found("template not found"))
}

struct ValidTemplate {
    name: String,
    subject: String,
    preview_image_url: Option<String>,
    html_content: String,
}

impl ValidTemplate {
    fn parse(req: &TemplateRequest) -> Result<Self, ApiErr> {
        if req.html_content.trim().is_empty() {
            return Err(ApiErr::bad_request("html_content must not be empty"));
        }
        Ok(Self {
            name: service::validate_name("name", &req.name, 100)?,
            subject: service::validate_name("subject", &req.subject, 200)?,
            preview_image_url: service::non_blank(req.preview_image_url.as_deref()),
            html_content: req.html_content.clone(),
        })
    }

    fn fields(&self) -> TemplateFields<'_> {
        TemplateFields {
            name: &self.name,
            subject: &self.subject,
            preview_image_url: self.preview_image_url.as_deref(),
            html_content: &self.html_content,
        }
    }
}

/// POST /api/templates
pub async fn create(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiErr> {
    user.require_platform_admin()?;
    let template = ValidTemplate::parse(&req)?;
    let id = service::new_id();
    let conn = db.conn();
    sq_execute(&conn, db::campaigns::template_insert(&id, &template.fields()))
        .map_err(ApiErr::from_db("create template"))?;
    tracing::info!(template_id = %id, "phishing template created");
    Ok((StatusCode::CREATED, Json(load_template(&conn, &id)?)))
}

/// PUT /api/templates/:id
pub async fn update(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    user.require_platform_admin()?;
    let template = ValidTemplate::parse(&req)?;
    let conn = db.conn();
    load_template(&conn, &id)?;
    sq_execute(&conn, db::campaigns::template_update(&id, &template.fields()))
        .map_err(ApiErr::from_db("update template"))?;
    load_template(&conn, &id).map(Json)
}

/// POST /api/templates/:id/deactivate — hidden from selection, kept for
/// campaigns that already use it.
pub async fn deactivate(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    user.require_platform_admin()?;
    let conn = db.conn();
    load_template(&conn, &id)?;
    sq_execute(&conn, db::campaigns::template_deactivate(&id))
        .map_err(ApiErr::from_db("deactivate template"))?;
    load_template(&conn, &id).map(Json)
}

/// GET /api/templates — active templates.
pub async fn list(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListTemplatesResponse>, ApiErr> {
    user.require_admin()?;
    let conn = db.conn();
    let templates = sq_query_map(&conn, db::campaigns::template_list_active(), template_from_row)
        .map_err(ApiErr::from_db("list templates"))?;
    Ok(Json(ListTemplatesResponse { templates }))
}

/// GET /api/templates/:id/preview — rendered with sample values.
pub async fn preview(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiErr> {
    user.require_admin()?;
    let conn = db.conn();
    let template = load_template(&conn, &id)?;
    Ok(Html(render::render(
        &template.html_content,
        &render::sample_context(),
    )))
}
