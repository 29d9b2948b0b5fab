use axum::{Json, extract::State, http::StatusCode};
use awarenow_api::HealthResponse;

use crate::storage::Db;

/// GET /api/health — liveness plus a database round trip. Answers 503 while
/// the database is unreachable.
pub async fn health(State(db): State<Db>) -> (StatusCode, Json<HealthResponse>) {
    let database = match db.conn().query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("health check query failed: {e}");
            false
        }
    };
    let (status, label) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::testing::TestApp;

    #[tokio::test]
    async fn health_reports_database_reachability() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }
}
