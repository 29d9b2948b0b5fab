pub mod auth;
pub mod campaigns;
pub mod company;
pub mod courses;
pub mod dashboard;
pub mod health;
pub mod learning;
pub mod platform;
pub mod templates;
pub mod tracking;

use awarenow_api::service;

pub(crate) fn now_unix() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Today as `YYYY-MM-DD` (UTC).
pub(crate) fn today() -> String {
    service::sqlite_date(chrono::Utc::now())
}

/// Current time in the stored `datetime` format.
pub(crate) fn now_datetime() -> String {
    service::sqlite_datetime(chrono::Utc::now())
}
