//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum SubscriptionPlans {
    Table,
    Id,
    Name,
    MaxUsers,
    Price,
    HasPlatformSupport,
    CreatedAt,
}

#[derive(Iden)]
pub enum Companies {
    Table,
    Id,
    Name,
    EmailDomain,
    SubscriptionPlanId,
    LicenseStartDate,
    LicenseEndDate,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    CompanyId,
    Email,
    FirstName,
    LastName,
    Role,
    Department,
    JobTitle,
    PhoneNumber,
    PasswordHash,
    PasswordSalt,
    IsActive,
    IsDisabled,
    ActivationToken,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum EmployeeProfiles {
    Table,
    UserId,
    EmployeeId,
    CompletedCoursesCount,
    AverageQuizScore,
    PhishingTestsTaken,
    PhishingTestsPassed,
    AwarenessScore,
    UpdatedAt,
}

#[derive(Iden)]
pub enum CompanyGroups {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    IsSystem,
    CreatedAt,
}

#[derive(Iden)]
pub enum GroupMembers {
    Table,
    GroupId,
    UserId,
    JoinedAt,
}

#[derive(Iden)]
pub enum CourseCategories {
    Table,
    Id,
    Name,
    Description,
    Icon,
    Color,
}

#[derive(Iden)]
pub enum Courses {
    Table,
    Id,
    Title,
    BriefDescription,
    CategoryId,
    ThumbnailUrl,
    VideoUrl,
    VideoDurationMinutes,
    Visibility,
    PointsReward,
    IsPublished,
    PublishedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum CompanyCourseAssignments {
    Table,
    Id,
    CompanyId,
    CourseId,
    AssignedBy,
    AssignedAt,
}

#[derive(Iden)]
pub enum EmployeeCourseAssignments {
    Table,
    Id,
    EmployeeId,
    CourseId,
    CompanyAssignmentId,
    AssignedBy,
    DueDate,
    Status,
    ProgressPercentage,
    StartedAt,
    CompletedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum EmployeeCourseProgress {
    Table,
    AssignmentId,
    VideoTotalSeconds,
    VideoWatchedSeconds,
    TotalTimeSpent,
    RequiredWatchPercentage,
    RequiredQuizScore,
    QuizAttempts,
    BestQuizScore,
    PassedQuiz,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Quizzes {
    Table,
    Id,
    CourseId,
    Title,
    Description,
    PassingScore,
    TimeLimitMinutes,
    MaxAttempts,
    CreatedAt,
}

#[derive(Iden)]
pub enum QuizQuestions {
    Table,
    Id,
    QuizId,
    QuestionText,
    QuestionType,
    #[iden = "option_a"]
    OptionA,
    #[iden = "option_b"]
    OptionB,
    #[iden = "option_c"]
    OptionC,
    #[iden = "option_d"]
    OptionD,
    CorrectAnswers,
    Points,
    Explanation,
    SortOrder,
}

#[derive(Iden)]
pub enum QuizAttempts {
    Table,
    Id,
    EmployeeId,
    QuizId,
    AssignmentId,
    AttemptNumber,
    Score,
    Passed,
    TimeTakenSeconds,
    AnswersData,
    CompletedAt,
}

#[derive(Iden)]
pub enum CourseCertificates {
    Table,
    Id,
    CertificateId,
    EmployeeId,
    CourseId,
    AssignmentId,
    VerificationToken,
    IssuedBy,
    IssuedAt,
}

#[derive(Iden)]
pub enum EmailTemplates {
    Table,
    Id,
    Name,
    Subject,
    PreviewImageUrl,
    HtmlContent,
    IsActive,
    CreatedAt,
}

#[derive(Iden)]
pub enum PhishingCampaigns {
    Table,
    Id,
    CompanyId,
    Title,
    GroupId,
    Sender,
    ScheduledDate,
    Status,
    TemplateId,
    CreatedBy,
    CreatedAt,
    PublishedAt,
    CompletedAt,
}

#[derive(Iden)]
pub enum CampaignRecipients {
    Table,
    Id,
    CampaignId,
    UserId,
    Email,
    FirstName,
    LastName,
    Token,
    SentAt,
    OpenedAt,
    ClickedAt,
    FallenAt,
}
