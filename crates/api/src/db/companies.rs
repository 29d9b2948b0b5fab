//! Subscription plan and company (tenant) query builders.

use sea_query::{Expr, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder};

use super::tables::{Companies, SubscriptionPlans};
use super::{Built, opt_str};
use crate::CompanyStatus;

// ── Plans ──────────────────────────────────────────────────────────────────

/// Column order: id, name, max_users, price, has_platform_support, created_at.
pub fn plan_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((SubscriptionPlans::Table, SubscriptionPlans::Id))
        .column((SubscriptionPlans::Table, SubscriptionPlans::Name))
        .column((SubscriptionPlans::Table, SubscriptionPlans::MaxUsers))
        .column((SubscriptionPlans::Table, SubscriptionPlans::Price))
        .column((SubscriptionPlans::Table, SubscriptionPlans::HasPlatformSupport))
        .column((SubscriptionPlans::Table, SubscriptionPlans::CreatedAt))
}

pub fn plan_insert(
    id: &str,
    name: &str,
    max_users: i64,
    price: f64,
    has_platform_support: bool,
) -> Built {
    Query::insert()
        .into_table(SubscriptionPlans::Table)
        .columns([
            SubscriptionPlans::Id,
            SubscriptionPlans::Name,
            SubscriptionPlans::MaxUsers,
            SubscriptionPlans::Price,
            SubscriptionPlans::HasPlatformSupport,
        ])
        .values_panic([
            id.into(),
            name.into(),
            max_users.into(),
            price.into(),
            has_platform_support.into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn plan_get(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    plan_columns(&mut q);
    q.from(SubscriptionPlans::Table)
        .and_where(Expr::col((SubscriptionPlans::Table, SubscriptionPlans::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// Plans ordered by seat count.
pub fn plan_list() -> Built {
    let mut q = Query::select().to_owned();
    plan_columns(&mut q);
    q.from(SubscriptionPlans::Table)
        .order_by(SubscriptionPlans::MaxUsers, Order::Asc)
        .order_by(SubscriptionPlans::Name, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Seat limit of a company's plan. No row when the company has no plan.
pub fn seat_limit(company_id: &str) -> Built {
    Query::select()
        .column((SubscriptionPlans::Table, SubscriptionPlans::MaxUsers))
        .from(Companies::Table)
        .inner_join(
            SubscriptionPlans::Table,
            Expr::col((SubscriptionPlans::Table, SubscriptionPlans::Id))
                .equals((Companies::Table, Companies::SubscriptionPlanId)),
        )
        .and_where(Expr::col((Companies::Table, Companies::Id)).eq(company_id))
        .build(SqliteQueryBuilder)
}

// ── Companies ──────────────────────────────────────────────────────────────

/// Column order: id, name, email_domain, subscription_plan_id,
/// license_start_date, license_end_date, status, created_at.
pub fn company_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Companies::Table, Companies::Id))
        .column((Companies::Table, Companies::Name))
        .column((Companies::Table, Companies::EmailDomain))
        .column((Companies::Table, Companies::SubscriptionPlanId))
        .column((Companies::Table, Companies::LicenseStartDate))
        .column((Companies::Table, Companies::LicenseEndDate))
        .column((Companies::Table, Companies::Status))
        .column((Companies::Table, Companies::CreatedAt))
}

/// Values of a new tenant.
pub struct NewCompany<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email_domain: &'a str,
    pub subscription_plan_id: Option<&'a str>,
    pub license_start_date: Option<&'a str>,
    pub license_end_date: Option<&'a str>,
}

pub fn insert(company: &NewCompany<'_>) -> Built {
    Query::insert()
        .into_table(Companies::Table)
        .columns([
            Companies::Id,
            Companies::Name,
            Companies::EmailDomain,
            Companies::SubscriptionPlanId,
            Companies::LicenseStartDate,
            Companies::LicenseEndDate,
            Companies::Status,
        ])
        .values_panic([
            company.id.into(),
            company.name.into(),
            company.email_domain.into(),
            opt_str(company.subscription_plan_id),
            opt_str(company.license_start_date),
            opt_str(company.license_end_date),
            CompanyStatus::Active.as_str().into(),
        ])
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    let mut q = Query::select().to_owned();
    company_columns(&mut q);
    q.from(Companies::Table)
        .and_where(Expr::col((Companies::Table, Companies::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// All companies, newest first.
pub fn list() -> Built {
    let mut q = Query::select().to_owned();
    company_columns(&mut q);
    q.from(Companies::Table)
        .order_by((Companies::Table, Companies::CreatedAt), Order::Desc)
        .order_by((Companies::Table, Companies::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Validated changes to a company. `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct CompanyChanges {
    pub name: Option<String>,
    pub subscription_plan_id: Option<String>,
    pub license_start_date: Option<String>,
    pub license_end_date: Option<String>,
    pub status: Option<CompanyStatus>,
}

impl CompanyChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.subscription_plan_id.is_none()
            && self.license_start_date.is_none()
            && self.license_end_date.is_none()
            && self.status.is_none()
    }
}

/// UPDATE the columns present in `changes`. Callers skip empty change sets.
pub fn update(id: &str, changes: &CompanyChanges) -> Built {
    let mut values: Vec<(Companies, SimpleExpr)> = Vec::new();
    if let Some(name) = &changes.name {
        values.push((Companies::Name, name.as_str().into()));
    }
    if let Some(plan) = &changes.subscription_plan_id {
        values.push((Companies::SubscriptionPlanId, plan.as_str().into()));
    }
    if let Some(start) = &changes.license_start_date {
        values.push((Companies::LicenseStartDate, start.as_str().into()));
    }
    if let Some(end) = &changes.license_end_date {
        values.push((Companies::LicenseEndDate, end.as_str().into()));
    }
    if let Some(status) = changes.status {
        values.push((Companies::Status, status.as_str().into()));
    }
    Query::update()
        .table(Companies::Table)
        .values(values)
        .and_where(Expr::col(Companies::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Of `ids`, those belonging to ACTIVE companies.
pub fn filter_active(ids: &[String]) -> Built {
    Query::select()
        .column(Companies::Id)
        .from(Companies::Table)
        .and_where(Expr::col(Companies::Id).is_in(ids.iter().map(String::as_str)))
        .and_where(Expr::col(Companies::Status).eq(CompanyStatus::Active.as_str()))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_only_touches_given_columns() {
        let changes = CompanyChanges {
            name: Some("Contoso".into()),
            status: Some(CompanyStatus::Suspended),
            ..Default::default()
        };
        let (sql, values) = update("c1", &changes);
        assert!(sql.contains(r#""name" = ?"#));
        assert!(sql.contains(r#""status" = ?"#));
        assert!(!sql.contains("license_end_date"));
        assert_eq!(values.0.len(), 3);
        assert!(CompanyChanges::default().is_empty());
    }

    #[test]
    fn seat_limit_joins_plan() {
        let (sql, _) = seat_limit("c1");
        assert!(sql.contains("INNER JOIN"));
        assert!(sql.contains(r#""subscription_plans"."max_users""#));
    }
}
