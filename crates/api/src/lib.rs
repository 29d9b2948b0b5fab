//! Shared API types, business rules, crypto, and SQL builders for AwareNow.
//!
//! This crate is the **single source of truth** for all request/response
//! types and for the rules behind course progress, quiz grading, phishing
//! campaigns, and awareness scoring. The server keeps its route handlers as
//! thin adapters over these modules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod campaign;
#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
pub mod progress;
pub mod quiz;
#[cfg(feature = "backend")]
pub mod render;
pub mod score;
#[cfg(feature = "backend")]
pub mod service;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Platform-wide user role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    PlatformAdmin,
    CompanyAdmin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlatformAdmin => "PLATFORM_ADMIN",
            Self::CompanyAdmin => "COMPANY_ADMIN",
            Self::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLATFORM_ADMIN" => Some(Self::PlatformAdmin),
            "COMPANY_ADMIN" => Some(Self::CompanyAdmin),
            "EMPLOYEE" => Some(Self::Employee),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Licensing status of a tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Suspended,
    Expired,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "SUSPENDED" => Some(Self::Suspended),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a course assignment for one employee. Moves only forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may be assigned a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourseVisibility {
    #[default]
    All,
    Specific,
}

impl CourseVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Specific => "specific",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "specific" => Some(Self::Specific),
            _ => None,
        }
    }
}

impl std::fmt::Display for CourseVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of quiz question; decides how many answers may be correct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::MultipleSelect => "multiple_select",
            Self::TrueFalse => "true_false",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(Self::MultipleChoice),
            "multiple_select" => Some(Self::MultipleSelect),
            "true_false" => Some(Self::TrueFalse),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phishing campaign lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Published,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Email + password login. `company_id` disambiguates an email that exists
/// in more than one tenant.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub company_id: Option<String>,
}

/// Returned by login and refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Sets the first password of an invited account.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ─── Plans & Companies ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub max_users: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub has_platform_support: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub max_users: i64,
    pub price: f64,
    pub has_platform_support: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListPlansResponse {
    pub plans: Vec<PlanResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub email_domain: String,
    #[serde(default)]
    pub subscription_plan_id: Option<String>,
    #[serde(default)]
    pub license_start_date: Option<String>,
    #[serde(default)]
    pub license_end_date: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub subscription_plan_id: Option<String>,
    pub license_start_date: Option<String>,
    pub license_end_date: Option<String>,
    pub status: Option<CompanyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: String,
    pub name: String,
    pub email_domain: String,
    pub subscription_plan_id: Option<String>,
    pub license_start_date: Option<String>,
    pub license_end_date: Option<String>,
    pub status: CompanyStatus,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCompaniesResponse {
    pub companies: Vec<CompanyResponse>,
}

/// Platform admin invites the first administrator of a company.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCompanyAdminRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub company_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub is_active: bool,
    pub is_disabled: bool,
    pub created_at: String,
}

/// Returned when an account is created in the pending (not yet activated)
/// state.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitedUserResponse {
    pub user: UserResponse,
    pub activation_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCompanyUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub member_count: i64,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GroupListQuery {
    pub include_system: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListGroupsResponse {
    pub groups: Vec<GroupResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupDetailResponse {
    pub group: GroupResponse,
    pub members: Vec<UserResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddGroupMembersRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddGroupMembersResponse {
    pub added: usize,
}

// ─── Courses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub course_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCategoriesResponse {
    pub categories: Vec<CategoryResponse>,
}

/// Full course form, used for both create and edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRequest {
    pub title: String,
    #[serde(default)]
    pub brief_description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub video_duration_minutes: i64,
    #[serde(default)]
    pub visibility: CourseVisibility,
    #[serde(default)]
    pub points_reward: i64,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    pub id: String,
    pub title: String,
    pub brief_description: String,
    pub category_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub video_duration_minutes: i64,
    pub visibility: CourseVisibility,
    pub points_reward: i64,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CourseListQuery {
    /// `published` or `draft`.
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCoursesResponse {
    pub courses: Vec<CourseResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignCompaniesRequest {
    pub company_ids: Vec<String>,
}

/// Number of new rows created by a bulk assignment.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssignCountResponse {
    pub assigned: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyCourseResponse {
    pub course: CourseResponse,
    pub assigned_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCompanyCoursesResponse {
    pub courses: Vec<CompanyCourseResponse>,
}

/// Company admin assigns a course to employees, directly and/or via a group.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssignEmployeesRequest {
    #[serde(default)]
    pub employee_ids: Vec<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

// ─── Quizzes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub time_limit_minutes: Option<i64>,
    #[serde(default)]
    pub max_attempts: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuestionRequest {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
    #[serde(default)]
    pub option_c: Option<String>,
    #[serde(default)]
    pub option_d: Option<String>,
    /// Comma-separated option letters, e.g. `"B"` or `"B,D"`.
    pub correct_answers: String,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// A quiz question. `correct_answers` and `explanation` are withheld from
/// employees taking the quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<String>,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: f64,
    pub time_limit_minutes: i64,
    pub max_attempts: i64,
    pub questions: Vec<QuestionResponse>,
}

// ─── Learning (employee side) ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub video_total_seconds: i64,
    pub video_watched_seconds: i64,
    pub total_time_spent: i64,
    pub required_watch_percentage: i64,
    pub required_quiz_score: f64,
    pub quiz_attempts: i64,
    pub best_quiz_score: Option<f64>,
    pub passed_quiz: bool,
    pub watch_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub id: String,
    pub employee_id: String,
    pub course_id: String,
    pub course_title: String,
    pub status: AssignmentStatus,
    pub progress_percentage: f64,
    pub due_date: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub assigned_at: String,
    pub is_overdue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAssignmentsResponse {
    pub assignments: Vec<AssignmentResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchRequest {
    pub watched_seconds: i64,
    #[serde(default)]
    pub time_spent_seconds: Option<i64>,
}

/// Answers keyed by question id; each value lists the chosen option letters.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub time_taken_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizAttemptResponse {
    pub attempt_number: i64,
    pub score: f64,
    pub passed: bool,
    pub late: bool,
    pub assignment: AssignmentResponse,
    pub certificate: Option<CertificateResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub certificate_id: String,
    pub employee_id: String,
    pub course_id: String,
    pub course_title: String,
    pub assignment_id: String,
    pub verification_token: String,
    pub issued_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCertificatesResponse {
    pub certificates: Vec<CertificateResponse>,
}

/// Public answer of the certificate verification endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateVerificationResponse {
    pub certificate_id: String,
    pub employee_name: String,
    pub course_title: String,
    pub issued_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub employee_id: Option<String>,
    pub completed_courses_count: i64,
    pub average_quiz_score: f64,
    pub phishing_tests_taken: i64,
    pub phishing_tests_passed: i64,
    pub awareness_score: f64,
}

// ─── Dashboards ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanySummary {
    pub name: String,
    pub employee_count: i64,
    pub completed_courses: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub employee_email: String,
    pub company: String,
    pub course: String,
    pub completed_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverdueSummary {
    pub assignment_id: String,
    pub employee_email: String,
    pub course: String,
    pub due_date: String,
    pub status: AssignmentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlatformDashboardResponse {
    pub total_courses: i64,
    pub published_courses: i64,
    pub total_companies: i64,
    pub assigned_count: i64,
    pub in_progress_count: i64,
    pub completed_count: i64,
    pub total_assignments: i64,
    pub completion_rate: f64,
    pub overdue_count: i64,
    pub company_summary: Vec<CompanySummary>,
    pub recent_completions: Vec<CompletionSummary>,
    pub overdue_list: Vec<OverdueSummary>,
    pub avg_quiz_score: f64,
    pub total_quiz_attempts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyDashboardResponse {
    pub employee_count: i64,
    pub group_count: i64,
    pub assigned_count: i64,
    pub in_progress_count: i64,
    pub completed_count: i64,
    pub completion_rate: f64,
    pub overdue_count: i64,
    pub avg_awareness_score: f64,
    pub draft_campaigns: i64,
    pub published_campaigns: i64,
    pub completed_campaigns: i64,
}

// ─── Email templates ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    pub html_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub preview_image_url: Option<String>,
    pub html_content: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTemplatesResponse {
    pub templates: Vec<TemplateResponse>,
}

// ─── Campaigns ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub group_id: String,
    pub sender: String,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateCampaignRequest {
    pub title: Option<String>,
    pub group_id: Option<String>,
    pub sender: Option<String>,
    pub scheduled_date: Option<String>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub group_id: String,
    pub group_name: Option<String>,
    pub sender: String,
    pub scheduled_date: Option<String>,
    pub status: CampaignStatus,
    pub template_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub published_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CampaignListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub q: String,
    pub campaigns: Vec<CampaignResponse>,
    pub active_campaign: Option<CampaignResponse>,
    pub completed_campaigns: Vec<CampaignResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishCampaignResponse {
    pub campaign: CampaignResponse,
    pub recipients: usize,
    pub sent: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub recipients: i64,
    pub sent: i64,
    pub opened: i64,
    pub clicked: i64,
    pub fallen: i64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub fall_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientReport {
    pub email: String,
    pub first_name: String,
    pub sent_at: Option<String>,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub fallen_at: Option<String>,
    pub opened: bool,
    pub clicked: bool,
    pub fallen: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignReportResponse {
    pub campaign: CampaignResponse,
    pub totals: CampaignTotals,
    pub recipients: Vec<RecipientReport>,
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Returned by `GET /api/health`. `database` is `false` when SQLite does not
/// answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code; the server converts it into the
/// `{"error": "..."}` response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }

    /// Build a closure that wraps a DB/IO error as `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_column_values() {
        for role in [Role::PlatformAdmin, Role::CompanyAdmin, Role::Employee] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        for status in [
            AssignmentStatus::Assigned,
            AssignmentStatus::InProgress,
            AssignmentStatus::Completed,
        ] {
            assert_eq!(AssignmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CampaignStatus::parse("archived"), None);
    }

    #[test]
    fn role_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&Role::CompanyAdmin).unwrap();
        assert_eq!(json, "\"COMPANY_ADMIN\"");
        let status: AssignmentStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, AssignmentStatus::InProgress);
    }

    #[test]
    fn service_error_maps_to_http_status() {
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ServiceError::Forbidden("x".into()).status_code(), 403);
        let api: ApiError = (&ServiceError::NotFound("course not found".into())).into();
        assert_eq!(api.error, "course not found");
    }
}
