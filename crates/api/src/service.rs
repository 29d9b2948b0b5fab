//! Shared business logic — framework-agnostic pure functions.
//!
//! Route handlers validate input here and keep only storage and response
//! assembly for themselves.

use chrono::NaiveDate;

use crate::{AuthTokenResponse, CourseRequest, Role, ServiceError};

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        && !email.contains(char::is_whitespace);
    if !valid {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Validate a password (8-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    match password.chars().count() {
        n if n < 8 => Err(ServiceError::BadRequest(
            "password must be at least 8 characters".into(),
        )),
        n if n > 128 => Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        )),
        _ => Ok(()),
    }
}

/// Validate a company email domain (`company.com`). Returns it trimmed and
/// lowercased.
pub fn validate_email_domain(domain: &str) -> Result<String, ServiceError> {
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() || domain.contains('@') || domain.contains(' ') || !domain.contains('.')
    {
        return Err(ServiceError::BadRequest(
            "Enter a valid domain (example: company.com)".into(),
        ));
    }
    Ok(domain)
}

/// Trim a required name and check its length in characters.
pub fn validate_name(field: &str, value: &str, max: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be 1-{max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate an ISO `YYYY-MM-DD` date.
pub fn validate_date(field: &str, value: &str) -> Result<String, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| ServiceError::BadRequest(format!("{field} must be a YYYY-MM-DD date")))
}

/// Validate an optional date, treating blank as absent.
pub fn validate_optional_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => validate_date(field, v).map(Some),
        None => Ok(None),
    }
}

/// The license window must not end before it starts.
pub fn validate_license_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(), ServiceError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ServiceError::BadRequest(
                "license end date must not be before its start date".into(),
            ));
        }
    }
    Ok(())
}

/// Only company admins and employees can be created inside a company.
pub fn validate_company_role(role: Role) -> Result<Role, ServiceError> {
    match role {
        Role::CompanyAdmin | Role::Employee => Ok(role),
        Role::PlatformAdmin => Err(ServiceError::BadRequest(
            "role must be COMPANY_ADMIN or EMPLOYEE".into(),
        )),
    }
}

/// Maximum length of a course brief description.
pub const MAX_BRIEF_DESCRIPTION: usize = 2048;

/// Longest accepted course video: 10 hours.
pub const MAX_VIDEO_MINUTES: i64 = 600;

/// Validate a course form. Returns the request with trimmed text fields.
pub fn validate_course(req: &CourseRequest) -> Result<CourseRequest, ServiceError> {
    let title = req.title.trim().to_string();
    if title.chars().count() < 5 {
        return Err(ServiceError::BadRequest(
            "Title must be at least 5 characters long.".into(),
        ));
    }
    if title.chars().count() > 200 {
        return Err(ServiceError::BadRequest(
            "Title must be at most 200 characters long.".into(),
        ));
    }
    let brief_description = req.brief_description.trim().to_string();
    if brief_description.chars().count() > MAX_BRIEF_DESCRIPTION {
        return Err(ServiceError::BadRequest(format!(
            "Brief description must be at most {MAX_BRIEF_DESCRIPTION} characters."
        )));
    }
    if req.video_duration_minutes < 1 {
        return Err(ServiceError::BadRequest(
            "Video duration must be at least 1 minute.".into(),
        ));
    }
    if req.video_duration_minutes > MAX_VIDEO_MINUTES {
        return Err(ServiceError::BadRequest(
            "Video duration cannot exceed 10 hours.".into(),
        ));
    }
    if req.points_reward < 0 {
        return Err(ServiceError::BadRequest(
            "Points reward must not be negative.".into(),
        ));
    }
    Ok(CourseRequest {
        title,
        brief_description,
        category_id: non_blank(req.category_id.as_deref()),
        thumbnail_url: non_blank(req.thumbnail_url.as_deref()),
        video_url: non_blank(req.video_url.as_deref()),
        ..req.clone()
    })
}

/// A percentage threshold such as a quiz passing score.
pub fn validate_percentage(field: &str, value: f64) -> Result<f64, ServiceError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ServiceError::BadRequest(format!(
            "{field} must be between 0 and 100"
        )));
    }
    Ok(value)
}

/// Blank strings become `None`; others are trimmed.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Primary key for new rows.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Human-facing certificate number: `CERT-` followed by 12 upper-case hex
/// characters.
pub fn generate_certificate_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("CERT-{}", hex[..12].to_ascii_uppercase())
}

/// Opaque token used in public certificate verification links.
pub fn generate_verification_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Per-recipient campaign tracking token.
pub fn generate_tracking_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Time ───────────────────────────────────────────────────────────────────

/// SQLite `datetime` representation of `now`.
pub fn sqlite_datetime(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// ISO date of `now`.
pub fn sqlite_date(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Everything needed to persist a refresh token and answer a login.
pub struct TokenBundle {
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the refresh_tokens row.
    pub token_id: String,
    /// `datetime` string for the refresh token expiry (DB column value).
    pub expires_at: String,
    /// Ready-to-return API response.
    pub response: AuthTokenResponse,
}

/// Build a [`TokenBundle`] containing a JWT, refresh token, and the auth response.
pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    email: &str,
    role: Role,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    let access_token = crypto::sign_jwt(user_id, role, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);

    let base = chrono::DateTime::from_timestamp(now_unix as i64, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    let expires_at = base
        .checked_add_signed(chrono::Duration::seconds(
            crypto::REFRESH_EXPIRY_SECS as i64,
        ))
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))
        .map(sqlite_datetime)?;

    Ok(TokenBundle {
        token_hash,
        token_id: new_id(),
        expires_at,
        response: AuthTokenResponse {
            access_token,
            refresh_token,
            expires_in: crypto::JWT_EXPIRY_SECS,
            user_id: user_id.to_string(),
            email: email.to_string(),
            role,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CourseVisibility;

    fn course(title: &str, minutes: i64) -> CourseRequest {
        CourseRequest {
            title: title.into(),
            brief_description: "Spot the hook".into(),
            category_id: Some("  ".into()),
            thumbnail_url: None,
            video_url: Some(" https://example.com/v ".into()),
            video_duration_minutes: minutes,
            visibility: CourseVisibility::Specific,
            points_reward: 150,
            is_published: true,
        }
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(
            validate_email("  John.Doe@TestCompany.com ").unwrap(),
            "john.doe@testcompany.com"
        );
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
    }

    #[test]
    fn domain_rules_match_company_form() {
        assert_eq!(validate_email_domain(" TestCompany.com ").unwrap(), "testcompany.com");
        assert!(validate_email_domain("user@company.com").is_err());
        assert!(validate_email_domain("company").is_err());
        assert!(validate_email_domain("my company.com").is_err());
    }

    #[test]
    fn course_title_and_duration_are_checked() {
        assert!(validate_course(&course("Phish", 45)).is_ok());
        assert!(validate_course(&course("Ph", 45)).is_err());
        assert!(validate_course(&course("Phishing 101", 601)).is_err());
        assert!(validate_course(&course("Phishing 101", 0)).is_err());

        let cleaned = validate_course(&course("  Phishing 101  ", 45)).unwrap();
        assert_eq!(cleaned.title, "Phishing 101");
        assert_eq!(cleaned.category_id, None);
        assert_eq!(cleaned.video_url.as_deref(), Some("https://example.com/v"));
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(validate_date("due", "2025-02-03").unwrap(), "2025-02-03");
        assert!(validate_date("due", "03/02/2025").is_err());
        assert_eq!(validate_optional_date("due", Some(" ")).unwrap(), None);
        assert!(validate_license_window(Some("2025-01-01"), Some("2024-12-31")).is_err());
        assert!(validate_license_window(Some("2024-01-01"), Some("2025-12-31")).is_ok());
    }

    #[test]
    fn certificate_id_has_expected_shape() {
        let id = generate_certificate_id();
        assert!(id.starts_with("CERT-"));
        assert_eq!(id.len(), 17);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn platform_admin_cannot_be_created_in_company() {
        assert!(validate_company_role(Role::PlatformAdmin).is_err());
        assert_eq!(validate_company_role(Role::Employee).unwrap(), Role::Employee);
    }

    #[test]
    fn token_bundle_expires_after_a_week() {
        let bundle = prepare_token_bundle("s", "u1", "a@b.co", Role::Employee, 0).unwrap();
        assert_eq!(bundle.expires_at, "1970-01-08 00:00:00");
        assert_eq!(bundle.response.role, Role::Employee);
        assert_eq!(
            bundle.token_hash,
            crate::crypto::hash_token(&bundle.response.refresh_token)
        );
    }
}
