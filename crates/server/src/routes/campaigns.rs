//! Phishing campaigns of a company: drafts, publishing with per-recipient
//! tracking links, completion, and reporting.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;

use awarenow_api::campaign;
use awarenow_api::db::campaigns::{CampaignChanges, NewCampaign, NewRecipient};
use awarenow_api::render::{self, RenderContext, TrackingLinks};
use awarenow_api::{
    CampaignListQuery, CampaignListResponse, CampaignReportResponse, CampaignResponse,
    CampaignStatus, CreateCampaignRequest, PublishCampaignResponse, RecipientReport,
    TemplateResponse, UpdateCampaignRequest, db, service,
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mailer::Mailer;
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, campaign_from_row, company_from_row, group_from_row, recipient_from_row,
    refresh_employee_profile, sq_execute, sq_query_map, sq_query_opt, template_from_row,
};

const COMPLETED_SHOWN: usize = 8;

pub(crate) fn load_campaign(
    conn: &Connection,
    company_id: &str,
    id: &str,
) -> Result<CampaignResponse, ApiErr> {
    sq_query_opt(conn, db::campaigns::campaign_get(company_id, id), campaign_from_row)
        .map_err(ApiErr::from_db("campaign lookup"))?
        .ok_or_else(|| ApiErr::not_found("campaign not found"))
}

/// The selected template, which must exist and be active.
fn selectable_template(
    conn: &Connection,
    template_id: Option<&str>,
) -> Result<TemplateResponse, ApiErr> {
    let template_id = service::non_blank(template_id)
        .ok_or_else(|| ApiErr::bad_request("Please select a template."))?;
    sq_query_opt(conn, db::campaigns::template_get(&template_id), template_from_row)
        .map_err(ApiErr::from_db("template lookup"))?
        .filter(|t| t.is_active)
        .ok_or_else(|| ApiErr::bad_request("Selected template is invalid."))
}

/// A non-system group of the company.
fn targetable_group(conn: &Connection, company_id: &str, group_id: &str) -> Result<(), ApiErr> {
    let group = sq_query_opt(conn, db::groups::get(company_id, group_id), group_from_row)
        .map_err(ApiErr::from_db("group lookup"))?
        .ok_or_else(|| ApiErr::bad_request("unknown group"))?;
    if group.is_system {
        return Err(ApiErr::bad_request("system groups cannot be targeted by a campaign"));
    }
    Ok(())
}

fn validate_sender(sender: &str) -> Result<String, ApiErr> {
    Ok(service::validate_name("sender", sender, 200)?)
}

/// `From` header of a campaign email. A sender without an address borrows
/// the configured sending address.
fn from_header(sender: &str, mail_from: &str) -> String {
    if sender.contains('@') {
        return sender.to_string();
    }
    let address = match (mail_from.find('<'), mail_from.rfind('>')) {
        (Some(start), Some(end)) if start < end => &mail_from[start + 1..end],
        _ => mail_from,
    };
    format!("{sender} <{}>", address.trim())
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// POST /api/campaigns
pub async fn create(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), ApiErr> {
    let company_id = user.company_admin_scope()?;
    let title = service::validate_name("title", &req.title, 200)?;
    let sender = validate_sender(&req.sender)?;
    let scheduled_date =
        service::validate_optional_date("scheduled_date", req.scheduled_date.as_deref())?;

    let conn = db.conn();
    let template = selectable_template(&conn, req.template_id.as_deref())?;
    targetable_group(&conn, company_id, &req.group_id)?;

    let id = service::new_id();
    sq_execute(
        &conn,
        db::campaigns::campaign_insert(&NewCampaign {
            id: &id,
            company_id,
            title: &title,
            group_id: &req.group_id,
            sender: &sender,
            scheduled_date: scheduled_date.as_deref(),
            template_id: &template.id,
            created_by: &user.user_id,
        }),
    )
    .map_err(ApiErr::from_db("create campaign"))?;

    tracing::info!(campaign_id = %id, %company_id, "campaign drafted");
    Ok((StatusCode::CREATED, Json(load_campaign(&conn, company_id, &id)?)))
}

/// PUT /api/campaigns/:id — drafts only.
pub async fn update(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let current = load_campaign(&conn, company_id, &id)?;
    campaign::ensure_editable(current.status)?;

    let mut changes = CampaignChanges {
        title: req
            .title
            .as_deref()
            .map(|t| service::validate_name("title", t, 200))
            .transpose()?,
        sender: req.sender.as_deref().map(validate_sender).transpose()?,
        scheduled_date: service::validate_optional_date(
            "scheduled_date",
            req.scheduled_date.as_deref(),
        )?,
        ..Default::default()
    };
    if let Some(group_id) = service::non_blank(req.group_id.as_deref()) {
        targetable_group(&conn, company_id, &group_id)?;
        changes.group_id = Some(group_id);
    }
    if req.template_id.is_some() {
        changes.template_id = Some(selectable_template(&conn, req.template_id.as_deref())?.id);
    }
    if changes.is_empty() {
        return Ok(Json(current));
    }

    let updated = sq_execute(&conn, db::campaigns::campaign_update(&id, &changes))
        .map_err(ApiErr::from_db("update campaign"))?;
    if updated == 0 {
        return Err(ApiErr::conflict("only drafts can be edited"));
    }
    load_campaign(&conn, company_id, &id).map(Json)
}

/// GET /api/campaigns/:id
pub async fn get(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CampaignResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    load_campaign(&conn, company_id, &id).map(Json)
}

/// GET /api/campaigns?q=
pub async fn list(
    State(db): State<Db>,
    user: AuthUser,
    Query(query): Query<CampaignListQuery>,
) -> Result<Json<CampaignListResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let q = query.q.as_deref().map(str::trim).unwrap_or_default().to_string();
    let conn = db.conn();

    let all = sq_query_map(&conn, db::campaigns::campaign_list(company_id, None), campaign_from_row)
        .map_err(ApiErr::from_db("list campaigns"))?;
    let active_campaign = all
        .iter()
        .find(|c| c.status == CampaignStatus::Published)
        .cloned();
    let completed_campaigns = all
        .iter()
        .filter(|c| c.status == CampaignStatus::Completed)
        .take(COMPLETED_SHOWN)
        .cloned()
        .collect();

    let campaigns = if q.is_empty() {
        all
    } else {
        sq_query_map(
            &conn,
            db::campaigns::campaign_list(company_id, Some(&q)),
            campaign_from_row,
        )
        .map_err(ApiErr::from_db("search campaigns"))?
    };

    Ok(Json(CampaignListResponse {
        q,
        campaigns,
        active_campaign,
        completed_campaigns,
    }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// A recipient snapshotted at publish time, waiting for delivery.
struct Delivery {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    token: String,
}

/// POST /api/campaigns/:id/publish — snapshot recipients and send the
/// emails.
pub async fn publish(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Mailer>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PublishCampaignResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?.to_string();

    let (campaign, template, company_name, deliveries) = {
        let mut conn = db.conn();
        let campaign = load_campaign(&conn, &company_id, &id)?;
        campaign::publish(campaign.status)?;
        let template = selectable_template(&conn, campaign.template_id.as_deref())?;
        let company_name = sq_query_opt(&conn, db::companies::get_by_id(&company_id), company_from_row)
            .map_err(ApiErr::from_db("company lookup"))?
            .map(|c| c.name)
            .unwrap_or_default();

        let members: Vec<(String, String, String, String)> = sq_query_map(
            &conn,
            db::groups::reachable_members(&campaign.group_id),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .map_err(ApiErr::from_db("campaign recipients"))?;
        if members.is_empty() {
            return Err(ApiErr::bad_request(
                "the target group has no active members to send to",
            ));
        }

        let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
        let moved = sq_execute(
            &tx,
            db::campaigns::campaign_transition(
                &id,
                CampaignStatus::Draft,
                CampaignStatus::Published,
            ),
        )
        .map_err(ApiErr::from_db("publish campaign"))?;
        if moved == 0 {
            return Err(ApiErr::conflict("campaign was published concurrently"));
        }

        let mut deliveries = Vec::with_capacity(members.len());
        for (user_id, email, first_name, last_name) in members {
            let delivery = Delivery {
                id: service::new_id(),
                email,
                first_name,
                last_name,
                token: service::generate_tracking_token(),
            };
            sq_execute(
                &tx,
                db::campaigns::recipient_insert(&NewRecipient {
                    id: &delivery.id,
                    campaign_id: &id,
                    user_id: Some(&user_id),
                    email: &delivery.email,
                    first_name: &delivery.first_name,
                    last_name: &delivery.last_name,
                    token: &delivery.token,
                }),
            )
            .map_err(ApiErr::from_db("snapshot recipient"))?;
            deliveries.push(delivery);
        }
        tx.commit().map_err(ApiErr::from_db("commit"))?;
        (campaign, template, company_name, deliveries)
    };

    let from = from_header(&campaign.sender, &config.mail_from);
    let mut sent = Vec::with_capacity(deliveries.len());
    for delivery in &deliveries {
        let ctx = RenderContext::from([
            ("first_name", delivery.first_name.clone()),
            ("last_name", delivery.last_name.clone()),
            ("email", delivery.email.clone()),
            ("company", company_name.clone()),
        ]);
        let subject = render::render_text(&template.subject, &ctx);
        let links = TrackingLinks::new(&config.base_url, &delivery.token);
        let html = render::render_campaign_email(&template.html_content, ctx, &links);
        match mailer.send(&delivery.email, &subject, &html, Some(&from)).await {
            Ok(()) if mailer.delivers() => sent.push(delivery.id.as_str()),
            Ok(()) => {}
            Err(e) => tracing::warn!(campaign_id = %id, to = %delivery.email, "campaign email failed: {e:#}"),
        }
    }

    let conn = db.conn();
    for recipient_id in &sent {
        sq_execute(&conn, db::campaigns::recipient_mark_sent(recipient_id))
            .map_err(ApiErr::from_db("mark sent"))?;
    }
    tracing::info!(
        campaign_id = %id,
        recipients = deliveries.len(),
        sent = sent.len(),
        "campaign published"
    );
    Ok(Json(PublishCampaignResponse {
        campaign: load_campaign(&conn, &company_id, &id)?,
        recipients: deliveries.len(),
        sent: sent.len(),
    }))
}

/// POST /api/campaigns/:id/complete — close tracking and score recipients.
pub async fn complete(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CampaignResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let mut conn = db.conn();
    let current = load_campaign(&conn, company_id, &id)?;
    campaign::complete(current.status)?;

    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    let moved = sq_execute(
        &tx,
        db::campaigns::campaign_transition(
            &id,
            CampaignStatus::Published,
            CampaignStatus::Completed,
        ),
    )
    .map_err(ApiErr::from_db("complete campaign"))?;
    if moved == 0 {
        return Err(ApiErr::conflict("campaign was completed concurrently"));
    }

    let recipients = sq_query_map(&tx, db::campaigns::recipients(&id), recipient_from_row)
        .map_err(ApiErr::from_db("campaign recipients"))?;
    for recipient in &recipients {
        let Some(user_id) = &recipient.user_id else {
            continue;
        };
        sq_execute(&tx, db::learning::profile_insert(user_id))
            .map_err(ApiErr::from_db("create profile"))?;
        sq_execute(
            &tx,
            db::learning::profile_record_phishing(user_id, recipient.flags.passed_test()),
        )
        .map_err(ApiErr::from_db("record phishing test"))?;
        refresh_employee_profile(&tx, user_id).map_err(ApiErr::from_db("refresh profile"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    tracing::info!(campaign_id = %id, recipients = recipients.len(), "campaign completed");
    load_campaign(&conn, company_id, &id).map(Json)
}

/// GET /api/campaigns/:id/report
pub async fn report(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CampaignReportResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let campaign = load_campaign(&conn, company_id, &id)?;
    let rows = sq_query_map(&conn, db::campaigns::recipients(&id), recipient_from_row)
        .map_err(ApiErr::from_db("campaign recipients"))?;

    let totals = campaign::tally(rows.iter().map(|r| (r.sent_at.is_some(), &r.flags)));
    let recipients = rows
        .into_iter()
        .map(|r| RecipientReport {
            opened: r.flags.opened(),
            clicked: r.flags.clicked(),
            fallen: r.flags.fallen(),
            email: r.email,
            first_name: r.first_name,
            sent_at: r.sent_at,
            opened_at: r.flags.opened_at,
            clicked_at: r.flags.clicked_at,
            fallen_at: r.flags.fallen_at,
        })
        .collect();

    Ok(Json(CampaignReportResponse {
        campaign,
        totals,
        recipients,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, header};
    use serde_json::{Value, json};

    use awarenow_api::Role;

    use super::*;
    use crate::testing::{BASE_URL, TestApp};

    #[test]
    fn sender_names_borrow_the_configured_address() {
        assert_eq!(
            from_header("IT Helpdesk", "AwareNow <no-reply@awarenow.test>"),
            "IT Helpdesk <no-reply@awarenow.test>"
        );
        assert_eq!(
            from_header("IT Helpdesk", "no-reply@awarenow.test"),
            "IT Helpdesk <no-reply@awarenow.test>"
        );
        assert_eq!(
            from_header("Payroll <payroll@contoso.com>", "no-reply@awarenow.test"),
            "Payroll <payroll@contoso.com>"
        );
    }

    /// Company `acme` with an admin and a `sales` group of two reachable
    /// employees, one disabled employee, and one not yet activated.
    fn campaign_app() -> (TestApp, String) {
        campaign_world(TestApp::new())
    }

    fn campaign_world(app: TestApp) -> (TestApp, String) {
        app.seed_company("acme", None);
        app.seed_user("admin", Some("acme"), "admin@acme.test", Role::CompanyAdmin);
        app.seed_user("ann", Some("acme"), "ann@acme.test", Role::Employee);
        app.seed_user("bob", Some("acme"), "bob@acme.test", Role::Employee);
        app.seed_user("gone", Some("acme"), "gone@acme.test", Role::Employee);
        app.seed_user("new", Some("acme"), "new@acme.test", Role::Employee);
        {
            let conn = app.db.conn();
            conn.execute("UPDATE users SET is_disabled = 1 WHERE id = 'gone'", [])
                .expect("disable");
            conn.execute("UPDATE users SET is_active = 0 WHERE id = 'new'", [])
                .expect("deactivate");
        }
        app.seed_group("sales", "acme", &["ann", "bob", "gone", "new"]);
        app.seed_template(
            "invoice",
            "Invoice for {{ first_name }}",
            r#"<p>Hi {{ first_name }}, see <a href="{{ tracking_url }}">invoice {{ invoice_id }}</a></p>"#,
        );
        let admin = app.token("admin", Role::CompanyAdmin);
        (app, admin)
    }

    async fn draft(app: &TestApp, admin: &str, title: &str) -> String {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/campaigns",
                Some(admin),
                Some(json!({
                    "title": title,
                    "group_id": "sales",
                    "sender": "IT Helpdesk",
                    "template_id": "invoice",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "draft");
        body["id"].as_str().expect("campaign id").to_string()
    }

    fn token_of(app: &TestApp, user_id: &str) -> String {
        app.db
            .conn()
            .query_row(
                "SELECT token FROM campaign_recipients WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .expect("recipient token")
    }

    fn profile(app: &TestApp, user_id: &str) -> (i64, i64) {
        app.db
            .conn()
            .query_row(
                "SELECT phishing_tests_taken, phishing_tests_passed FROM employee_profiles \
                 WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("profile")
    }

    #[tokio::test]
    async fn drafts_need_an_active_template_and_a_regular_group() {
        let (app, admin) = campaign_app();
        let mut body = json!({ "title": "Q1", "group_id": "sales", "sender": "IT" });

        let (status, err) = app
            .call(Method::POST, "/api/campaigns", Some(&admin), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "Please select a template.");

        body["template_id"] = json!("missing");
        let (_, err) = app
            .call(Method::POST, "/api/campaigns", Some(&admin), Some(body.clone()))
            .await;
        assert_eq!(err["error"], "Selected template is invalid.");

        body["template_id"] = json!("invoice");
        body["group_id"] = json!("acme-all");
        let (status, _) = app
            .call(Method::POST, "/api/campaigns", Some(&admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn campaign_lifecycle_tracks_and_scores_recipients() {
        let (app, admin) = campaign_app();
        {
            let conn = app.db.conn();
            conn.execute("UPDATE companies SET name = 'AT&T' WHERE id = 'acme'", [])
                .expect("rename company");
            conn.execute(
                "UPDATE email_templates SET subject = 'Invoice for {{ first_name }} at {{ company }}'",
                [],
            )
            .expect("subject");
        }
        let id = draft(&app, &admin, "Invoice lure").await;

        let (status, updated) = app
            .call(
                Method::PUT,
                &format!("/api/campaigns/{id}"),
                Some(&admin),
                Some(json!({ "title": "Invoice lure v2" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Invoice lure v2");

        let (status, published) = app
            .call(Method::POST, &format!("/api/campaigns/{id}/publish"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{published}");
        assert_eq!(published["recipients"], 2);
        assert_eq!(published["sent"], 2);
        assert_eq!(published["campaign"]["status"], "published");

        let mail = app.sent_mail();
        assert_eq!(mail.len(), 2);
        let ann_mail = mail.iter().find(|m| m.to == "ann@acme.test").expect("mail to ann");
        assert_eq!(ann_mail.subject, "Invoice for ann at AT&T");
        assert_eq!(ann_mail.from, "IT Helpdesk <no-reply@awarenow.local>");
        let ann = token_of(&app, "ann");
        let bob = token_of(&app, "bob");
        assert_ne!(ann, bob);
        assert!(ann_mail.html.contains(&format!("{BASE_URL}/t/click/{ann}")));
        assert!(ann_mail.html.contains(&format!("{BASE_URL}/t/open/{ann}.png")));

        let (status, _) = app
            .call(
                Method::PUT,
                &format!("/api/campaigns/{id}"),
                Some(&admin),
                Some(json!({ "title": "too late" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let pixel = app
            .send(Method::GET, &format!("/t/open/{bob}.png"), None, None)
            .await;
        assert_eq!(pixel.status(), StatusCode::OK);
        assert_eq!(pixel.headers()[header::CONTENT_TYPE], "image/gif");

        let click = app
            .send(Method::GET, &format!("/t/click/{ann}"), None, None)
            .await;
        assert!(click.status().is_redirection());
        assert_eq!(
            click.headers()[header::LOCATION],
            format!("/t/landing/{ann}").as_str()
        );
        let fall = app
            .send(Method::POST, &format!("/t/fall/{ann}"), None, None)
            .await;
        assert_eq!(fall.status(), StatusCode::OK);

        let (status, report) = app
            .call(Method::GET, &format!("/api/campaigns/{id}/report"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let totals = &report["totals"];
        assert_eq!(totals["recipients"], 2);
        assert_eq!(totals["sent"], 2);
        assert_eq!(totals["opened"], 2);
        assert_eq!(totals["clicked"], 1);
        assert_eq!(totals["fallen"], 1);
        assert_eq!(totals["open_rate"], 100.0);
        assert_eq!(totals["fall_rate"], 50.0);
        let ann_row = report["recipients"]
            .as_array()
            .and_then(|rows| rows.iter().find(|r| r["email"] == "ann@acme.test"))
            .expect("ann in report");
        assert_eq!(ann_row["opened"], true);
        assert_eq!(ann_row["fallen"], true);

        let (status, completed) = app
            .call(Method::POST, &format!("/api/campaigns/{id}/complete"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed["status"], "completed");
        assert!(completed["completed_at"].is_string());

        app.send(Method::POST, &format!("/t/fall/{bob}"), None, None)
            .await;
        assert_eq!(
            app.count("SELECT COUNT(*) FROM campaign_recipients WHERE fallen_at IS NOT NULL"),
            1
        );

        assert_eq!(profile(&app, "ann"), (1, 0));
        assert_eq!(profile(&app, "bob"), (1, 1));

        let (status, _) = app
            .call(Method::POST, &format!("/api/campaigns/{id}/complete"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, list) = app.call(Method::GET, "/api/campaigns", Some(&admin), None).await;
        assert!(list["active_campaign"].is_null());
        assert_eq!(list["completed_campaigns"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn log_only_mail_is_not_counted_as_sent() {
        let (app, admin) = campaign_world(TestApp::log_only());
        let id = draft(&app, &admin, "Invoice lure").await;

        let (status, published) = app
            .call(Method::POST, &format!("/api/campaigns/{id}/publish"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{published}");
        assert_eq!(published["recipients"], 2);
        assert_eq!(published["sent"], 0);
        assert!(app.sent_mail().is_empty());

        let (_, report) = app
            .call(Method::GET, &format!("/api/campaigns/{id}/report"), Some(&admin), None)
            .await;
        assert_eq!(report["totals"]["sent"], 0);
        assert!(report["recipients"][0]["sent_at"].is_null());
    }

    #[tokio::test]
    async fn publishing_an_unreachable_group_is_rejected() {
        let (app, admin) = campaign_app();
        app.seed_group("empty", "acme", &["gone", "new"]);
        let (_, body) = app
            .call(
                Method::POST,
                "/api/campaigns",
                Some(&admin),
                Some(json!({
                    "title": "Nobody home",
                    "group_id": "empty",
                    "sender": "IT",
                    "template_id": "invoice",
                })),
            )
            .await;
        let id = body["id"].as_str().expect("campaign id");

        let (status, _) = app
            .call(Method::POST, &format!("/api/campaigns/{id}/publish"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, campaign) = app
            .call(Method::GET, &format!("/api/campaigns/{id}"), Some(&admin), None)
            .await;
        assert_eq!(campaign["status"], "draft");
        assert!(app.sent_mail().is_empty());
    }

    #[tokio::test]
    async fn listing_searches_and_picks_the_active_campaign() {
        let (app, admin) = campaign_app();
        draft(&app, &admin, "Payroll update").await;
        let live = draft(&app, &admin, "Parcel delivery").await;
        app.call(Method::POST, &format!("/api/campaigns/{live}/publish"), Some(&admin), None)
            .await;

        let (_, list) = app
            .call(Method::GET, "/api/campaigns?q=PAYROLL", Some(&admin), None)
            .await;
        assert_eq!(list["q"], "PAYROLL");
        let titles: Vec<&Value> = list["campaigns"]
            .as_array()
            .map(|c| c.iter().map(|c| &c["title"]).collect())
            .unwrap_or_default();
        assert_eq!(titles, vec!["Payroll update"]);
        assert_eq!(list["active_campaign"]["id"], live.as_str());

        let other = {
            app.seed_company("globex", None);
            app.seed_user("g-admin", Some("globex"), "admin@globex.test", Role::CompanyAdmin);
            app.token("g-admin", Role::CompanyAdmin)
        };
        let (status, _) = app
            .call(Method::GET, &format!("/api/campaigns/{live}"), Some(&other), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tracking_answers_unknown_tokens_like_known_ones() {
        let app = TestApp::new();
        let pixel = app.send(Method::GET, "/t/open/unknown.png", None, None).await;
        assert_eq!(pixel.status(), StatusCode::OK);
        assert_eq!(pixel.headers()[header::CONTENT_TYPE], "image/gif");
        let fall = app.send(Method::GET, "/t/fall/unknown", None, None).await;
        assert_eq!(fall.status(), StatusCode::OK);
    }
}
