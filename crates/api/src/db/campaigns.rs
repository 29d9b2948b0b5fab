//! Email template, phishing campaign, and recipient query builders.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, Order, Query, SelectStatement, SimpleExpr,
    SqliteQueryBuilder,
};

use super::tables::{CampaignRecipients, CompanyGroups, EmailTemplates, PhishingCampaigns};
use super::{Built, now_expr, opt_str};
use crate::CampaignStatus;
use crate::campaign::RecipientFlags;

// ── Templates ──────────────────────────────────────────────────────────────

/// Column order: id, name, subject, preview_image_url, html_content,
/// is_active, created_at.
pub fn template_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((EmailTemplates::Table, EmailTemplates::Id))
        .column((EmailTemplates::Table, EmailTemplates::Name))
        .column((EmailTemplates::Table, EmailTemplates::Subject))
        .column((EmailTemplates::Table, EmailTemplates::PreviewImageUrl))
        .column((EmailTemplates::Table, EmailTemplates::HtmlContent))
        .column((EmailTemplates::Table, EmailTemplates::IsActive))
        .column((EmailTemplates::Table, EmailTemplates::CreatedAt))
}

/// Validated template content.
pub struct TemplateFields<'a> {
    pub name: &'a str,
    pub subject: &'a str,
    pub preview_image_url: Option<&'a str>,
    pub html_content: &'a str,
}

pub fn template_insert(id: &str, t: &TemplateFields<'_>) -> Built {
    Query::insert()
        .into_table(EmailTemplates::Table)
        .columns([
            EmailTemplates::Id,
            EmailTemplates::Name,
            EmailTemplates::Subject,
            EmailTemplates::PreviewImageUrl,
            EmailTemplates::HtmlContent,
        ])
        .values_panic([
            id.into(),
            t.name.into(),
            t.subject.into(),
            opt_str(t.preview_image_url),
            t.html_content.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn template_update(id: &str, t: &TemplateFields<'_>) -> Built {
    Query::update()
        .table(EmailTemplates::Table)
        .values([
            (EmailTemplates::Name, t.name.into()),
            (EmailTemplates::Subject, t.subject.into()),
            (EmailTemplates::PreviewImageUrl, opt_str(t.preview_image_url)),
            (EmailTemplates::HtmlContent, t.html_content.into()),
        ])
        .and_where(Expr::col(EmailTemplates::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn template_deactivate(id: &str) -> Built {
    Query::update()
        .table(EmailTemplates::Table)
        .value(EmailTemplates::IsActive, false)
        .and_where(Expr::col(EmailTemplates::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn template_get(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    template_columns(&mut q);
    q.from(EmailTemplates::Table)
        .and_where(Expr::col((EmailTemplates::Table, EmailTemplates::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Active templates by name.
pub fn template_list_active() -> Built {
    let mut q = Query::select().to_owned();
    template_columns(&mut q);
    q.from(EmailTemplates::Table)
        .and_where(Expr::col((EmailTemplates::Table, EmailTemplates::IsActive)).eq(true))
        .order_by((EmailTemplates::Table, EmailTemplates::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

// ── Campaigns ──────────────────────────────────────────────────────────────

/// Column order: id, company_id, title, group_id, group_name, sender,
/// scheduled_date, status, template_id, created_by, created_at,
/// published_at, completed_at.
pub fn campaign_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((PhishingCampaigns::Table, PhishingCampaigns::Id))
        .column((PhishingCampaigns::Table, PhishingCampaigns::CompanyId))
        .column((PhishingCampaigns::Table, PhishingCampaigns::Title))
        .column((PhishingCampaigns::Table, PhishingCampaigns::GroupId))
        .column((CompanyGroups::Table, CompanyGroups::Name))
        .column((PhishingCampaigns::Table, PhishingCampaigns::Sender))
        .column((PhishingCampaigns::Table, PhishingCampaigns::ScheduledDate))
        .column((PhishingCampaigns::Table, PhishingCampaigns::Status))
        .column((PhishingCampaigns::Table, PhishingCampaigns::TemplateId))
        .column((PhishingCampaigns::Table, PhishingCampaigns::CreatedBy))
        .column((PhishingCampaigns::Table, PhishingCampaigns::CreatedAt))
        .column((PhishingCampaigns::Table, PhishingCampaigns::PublishedAt))
        .column((PhishingCampaigns::Table, PhishingCampaigns::CompletedAt))
        .from(PhishingCampaigns::Table)
        .left_join(
            CompanyGroups::Table,
            Expr::col((CompanyGroups::Table, CompanyGroups::Id))
                .equals((PhishingCampaigns::Table, PhishingCampaigns::GroupId)),
        )
}

/// Values of a new draft.
pub struct NewCampaign<'a> {
    pub id: &'a str,
    pub company_id: &'a str,
    pub title: &'a str,
    pub group_id: &'a str,
    pub sender: &'a str,
    pub scheduled_date: Option<&'a str>,
    pub template_id: &'a str,
    pub created_by: &'a str,
}

pub fn campaign_insert(c: &NewCampaign<'_>) -> Built {
    Query::insert()
        .into_table(PhishingCampaigns::Table)
        .columns([
            PhishingCampaigns::Id,
            PhishingCampaigns::CompanyId,
            PhishingCampaigns::Title,
            PhishingCampaigns::GroupId,
            PhishingCampaigns::Sender,
            PhishingCampaigns::ScheduledDate,
            PhishingCampaigns::Status,
            PhishingCampaigns::TemplateId,
            PhishingCampaigns::CreatedBy,
        ])
        .values_panic([
            c.id.into(),
            c.company_id.into(),
            c.title.into(),
            c.group_id.into(),
            c.sender.into(),
            opt_str(c.scheduled_date),
            CampaignStatus::Draft.as_str().into(),
            c.template_id.into(),
            c.created_by.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// A campaign, scoped to its company.
pub fn campaign_get(company_id: &str, id: &str) -> Built {
    let mut q = Query::select().to_owned();
    campaign_columns(&mut q)
        .and_where(Expr::col((PhishingCampaigns::Table, PhishingCampaigns::Id)).eq(id))
        .and_where(
            Expr::col((PhishingCampaigns::Table, PhishingCampaigns::CompanyId)).eq(company_id),
        )
        .build(SqliteQueryBuilder)
}

/// Campaigns of a company, newest first. `search` matches title, sender, or
/// group name, ignoring case.
pub fn campaign_list(company_id: &str, search: Option<&str>) -> Built {
    let mut q = Query::select().to_owned();
    campaign_columns(&mut q).and_where(
        Expr::col((PhishingCampaigns::Table, PhishingCampaigns::CompanyId)).eq(company_id),
    );
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        q.cond_where(
            Cond::any()
                .add(
                    Expr::expr(Func::lower(Expr::col((
                        PhishingCampaigns::Table,
                        PhishingCampaigns::Title,
                    ))))
                    .like(pattern.as_str()),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col((
                        PhishingCampaigns::Table,
                        PhishingCampaigns::Sender,
                    ))))
                    .like(pattern.as_str()),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col((CompanyGroups::Table, CompanyGroups::Name))))
                        .like(pattern.as_str()),
                ),
        );
    }
    q.order_by((PhishingCampaigns::Table, PhishingCampaigns::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust("phishing_campaigns.rowid"), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Validated edits of a draft. `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct CampaignChanges {
    pub title: Option<String>,
    pub group_id: Option<String>,
    pub sender: Option<String>,
    pub scheduled_date: Option<String>,
    pub template_id: Option<String>,
}

impl CampaignChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.group_id.is_none()
            && self.sender.is_none()
            && self.scheduled_date.is_none()
            && self.template_id.is_none()
    }
}

/// UPDATE a draft. Rows in any other status are not touched.
pub fn campaign_update(id: &str, changes: &CampaignChanges) -> Built {
    let mut values: Vec<(PhishingCampaigns, SimpleExpr)> = Vec::new();
    if let Some(title) = &changes.title {
        values.push((PhishingCampaigns::Title, title.as_str().into()));
    }
    if let Some(group_id) = &changes.group_id {
        values.push((PhishingCampaigns::GroupId, group_id.as_str().into()));
    }
    if let Some(sender) = &changes.sender {
        values.push((PhishingCampaigns::Sender, sender.as_str().into()));
    }
    if let Some(date) = &changes.scheduled_date {
        values.push((PhishingCampaigns::ScheduledDate, date.as_str().into()));
    }
    if let Some(template_id) = &changes.template_id {
        values.push((PhishingCampaigns::TemplateId, template_id.as_str().into()));
    }
    Query::update()
        .table(PhishingCampaigns::Table)
        .values(values)
        .and_where(Expr::col(PhishingCampaigns::Id).eq(id))
        .and_where(Expr::col(PhishingCampaigns::Status).eq(CampaignStatus::Draft.as_str()))
        .build(SqliteQueryBuilder)
}

/// Move a campaign from `from` to `to`, stamping the matching timestamp.
/// The status guard makes concurrent transitions affect at most one row.
pub fn campaign_transition(id: &str, from: CampaignStatus, to: CampaignStatus) -> Built {
    let mut q = Query::update();
    q.table(PhishingCampaigns::Table)
        .value(PhishingCampaigns::Status, to.as_str());
    match to {
        CampaignStatus::Published => {
            q.value(PhishingCampaigns::PublishedAt, now_expr());
        }
        CampaignStatus::Completed => {
            q.value(PhishingCampaigns::CompletedAt, now_expr());
        }
        CampaignStatus::Draft => {}
    }
    q.and_where(Expr::col(PhishingCampaigns::Id).eq(id))
        .and_where(Expr::col(PhishingCampaigns::Status).eq(from.as_str()))
        .build(SqliteQueryBuilder)
}

/// Campaign counts of a company. Columns: status, count.
pub fn status_counts(company_id: &str) -> Built {
    Query::select()
        .column(PhishingCampaigns::Status)
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(PhishingCampaigns::Table)
        .and_where(Expr::col(PhishingCampaigns::CompanyId).eq(company_id))
        .group_by_col(PhishingCampaigns::Status)
        .build(SqliteQueryBuilder)
}

// ── Recipients ─────────────────────────────────────────────────────────────

/// Snapshot of one recipient taken at publish time.
pub struct NewRecipient<'a> {
    pub id: &'a str,
    pub campaign_id: &'a str,
    pub user_id: Option<&'a str>,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub token: &'a str,
}

pub fn recipient_insert(r: &NewRecipient<'_>) -> Built {
    Query::insert()
        .into_table(CampaignRecipients::Table)
        .columns([
            CampaignRecipients::Id,
            CampaignRecipients::CampaignId,
            CampaignRecipients::UserId,
            CampaignRecipients::Email,
            CampaignRecipients::FirstName,
            CampaignRecipients::LastName,
            CampaignRecipients::Token,
        ])
        .values_panic([
            r.id.into(),
            r.campaign_id.into(),
            opt_str(r.user_id),
            r.email.into(),
            r.first_name.into(),
            r.last_name.into(),
            r.token.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn recipient_mark_sent(id: &str) -> Built {
    Query::update()
        .table(CampaignRecipients::Table)
        .value(CampaignRecipients::SentAt, now_expr())
        .and_where(Expr::col(CampaignRecipients::Id).eq(id))
        .and_where(Expr::col(CampaignRecipients::SentAt).is_null())
        .build(SqliteQueryBuilder)
}

/// Recipients of a campaign by email.
///
/// Columns: id, user_id, email, first_name, last_name, token, sent_at,
/// opened_at, clicked_at, fallen_at.
pub fn recipients(campaign_id: &str) -> Built {
    Query::select()
        .columns([
            CampaignRecipients::Id,
            CampaignRecipients::UserId,
            CampaignRecipients::Email,
            CampaignRecipients::FirstName,
            CampaignRecipients::LastName,
            CampaignRecipients::Token,
            CampaignRecipients::SentAt,
            CampaignRecipients::OpenedAt,
            CampaignRecipients::ClickedAt,
            CampaignRecipients::FallenAt,
        ])
        .from(CampaignRecipients::Table)
        .and_where(Expr::col(CampaignRecipients::CampaignId).eq(campaign_id))
        .order_by(CampaignRecipients::Email, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Tracking lookup.
///
/// Columns: recipient id, campaign status, opened_at, clicked_at, fallen_at.
pub fn recipient_by_token(token: &str) -> Built {
    Query::select()
        .column((CampaignRecipients::Table, CampaignRecipients::Id))
        .column((PhishingCampaigns::Table, PhishingCampaigns::Status))
        .column((CampaignRecipients::Table, CampaignRecipients::OpenedAt))
        .column((CampaignRecipients::Table, CampaignRecipients::ClickedAt))
        .column((CampaignRecipients::Table, CampaignRecipients::FallenAt))
        .from(CampaignRecipients::Table)
        .inner_join(
            PhishingCampaigns::Table,
            Expr::col((PhishingCampaigns::Table, PhishingCampaigns::Id))
                .equals((CampaignRecipients::Table, CampaignRecipients::CampaignId)),
        )
        .and_where(Expr::col((CampaignRecipients::Table, CampaignRecipients::Token)).eq(token))
        .build(SqliteQueryBuilder)
}

/// Persist tracking flags. Timestamps already stored win over new ones.
pub fn recipient_stamp(id: &str, flags: &RecipientFlags) -> Built {
    let keep = |column: &str, value: &Option<String>| {
        Expr::cust_with_values(format!("COALESCE({column}, ?)"), [value.clone()])
    };
    Query::update()
        .table(CampaignRecipients::Table)
        .values([
            (CampaignRecipients::OpenedAt, keep("opened_at", &flags.opened_at)),
            (CampaignRecipients::ClickedAt, keep("clicked_at", &flags.clicked_at)),
            (CampaignRecipients::FallenAt, keep("fallen_at", &flags.fallen_at)),
        ])
        .and_where(Expr::col(CampaignRecipients::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_three_columns() {
        let (sql, values) = campaign_list("co1", Some("  Q1 "));
        assert_eq!(sql.matches("LIKE").count(), 3);
        assert_eq!(
            values.0[1],
            sea_query::Value::String(Some(Box::new("%q1%".into())))
        );
        let (sql, _) = campaign_list("co1", Some("   "));
        assert!(!sql.contains("LIKE"));
    }

    #[test]
    fn transition_is_guarded_by_current_status() {
        let (sql, values) =
            campaign_transition("c1", CampaignStatus::Draft, CampaignStatus::Published);
        assert!(sql.contains("published_at"));
        assert_eq!(values.0.len(), 3);
    }

    #[test]
    fn stamp_never_overwrites() {
        let flags = RecipientFlags {
            opened_at: Some("2025-01-01 10:00:00".into()),
            ..Default::default()
        };
        let (sql, _) = recipient_stamp("r1", &flags);
        assert!(sql.contains("COALESCE(opened_at, ?)"));
        assert!(sql.contains("COALESCE(fallen_at, ?)"));
    }
}
