//! Public, token-addressed tracking endpoints embedded in campaign emails.
//!
//! Every endpoint answers the same way whether or not the token is known or
//! the campaign still accepts events.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};

use awarenow_api::campaign::{self, RecipientFlags, TRACKING_PIXEL_GIF, TrackingEvent};
use awarenow_api::{CampaignStatus, db, render};

use crate::routes::now_datetime;
use crate::storage::{Db, sq_execute, sq_query_opt};

/// Stamp `event` on the recipient behind `token`. Failures are logged and
/// never surface to the caller.
fn record(db: &Db, token: &str, event: TrackingEvent) {
    let conn = db.conn();
    let found = sq_query_opt(&conn, db::campaigns::recipient_by_token(token), |row| {
        let status: String = row.get(1)?;
        Ok((
            row.get::<_, String>(0)?,
            CampaignStatus::parse(&status),
            RecipientFlags {
                opened_at: row.get(2)?,
                clicked_at: row.get(3)?,
                fallen_at: row.get(4)?,
            },
        ))
    });

    let (recipient_id, status, mut flags) = match found {
        Ok(Some(found)) => found,
        Ok(None) => {
            tracing::debug!(event = event.as_str(), "tracking hit for unknown token");
            return;
        }
        Err(e) => {
            tracing::error!("tracking lookup failed: {e}");
            return;
        }
    };
    if !status.is_some_and(campaign::accepts_tracking) {
        return;
    }
    if !flags.apply(event, &now_datetime()) {
        return;
    }
    match sq_execute(&conn, db::campaigns::recipient_stamp(&recipient_id, &flags)) {
        Ok(_) => tracing::info!(%recipient_id, event = event.as_str(), "phishing interaction recorded"),
        Err(e) => tracing::error!(%recipient_id, "tracking stamp failed: {e}"),
    }
}

/// GET /t/open/:token — the open pixel. A `.png` suffix is accepted.
pub async fn open(State(db): State<Db>, Path(token): Path<String>) -> Response {
    let token = token.strip_suffix(".png").unwrap_or(&token);
    record(&db, token, TrackingEvent::Open);
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        TRACKING_PIXEL_GIF,
    )
        .into_response()
}

/// GET /t/click/:token
pub async fn click(State(db): State<Db>, Path(token): Path<String>) -> Redirect {
    record(&db, &token, TrackingEvent::Click);
    Redirect::to(&format!("/t/landing/{}", urlencoding::encode(&token)))
}

/// GET /t/landing/:token — the fake sign-in page.
pub async fn landing(Path(token): Path<String>) -> Html<String> {
    let action = render::escape_html(&format!("/t/fall/{}", urlencoding::encode(&token)));
    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<main style="max-width:360px;margin:80px auto;font-family:sans-serif">
<h1>Sign in to continue</h1>
<form method="post" action="{action}">
<p><label>Email<br><input type="email" name="email" autocomplete="off"></label></p>
<p><label>Password<br><input type="password" name="password" autocomplete="off"></label></p>
<p><button type="submit">Sign in</button></p>
</form>
</main>
</body>
</html>"#
    ))
}

/// GET|POST /t/fall/:token — the recipient submitted the landing form.
/// Form fields are never read.
pub async fn fall(State(db): State<Db>, Path(token): Path<String>) -> Html<&'static str> {
    record(&db, &token, TrackingEvent::Fall);
    Html(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Access Recorded</title></head>
<body>
<main style="max-width:480px;margin:80px auto;font-family:sans-serif">
<h1>Access Recorded</h1>
<p>This was a phishing simulation run by your organisation. No credentials were stored.</p>
</main>
</body>
</html>"#,
    )
}
