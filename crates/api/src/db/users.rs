//! User / auth query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::tables::{RefreshTokens, Users};
use super::{Built, opt_str};

// ── Columns ────────────────────────────────────────────────────────────────

/// Column order: id, company_id, email, first_name, last_name, role,
/// department, job_title, is_active, is_disabled, created_at.
pub fn user_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((Users::Table, Users::Id))
        .column((Users::Table, Users::CompanyId))
        .column((Users::Table, Users::Email))
        .column((Users::Table, Users::FirstName))
        .column((Users::Table, Users::LastName))
        .column((Users::Table, Users::Role))
        .column((Users::Table, Users::Department))
        .column((Users::Table, Users::JobTitle))
        .column((Users::Table, Users::IsActive))
        .column((Users::Table, Users::IsDisabled))
        .column((Users::Table, Users::CreatedAt))
}

// ── Lookups ────────────────────────────────────────────────────────────────

/// Find user by id.
pub fn get_by_id(user_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q);
    q.from(Users::Table)
        .and_where(Expr::col((Users::Table, Users::Id)).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Users of one company, newest first.
pub fn list_by_company(company_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    user_columns(&mut q);
    q.from(Users::Table)
        .and_where(Expr::col((Users::Table, Users::CompanyId)).eq(company_id))
        .order_by((Users::Table, Users::CreatedAt), Order::Desc)
        .order_by((Users::Table, Users::Email), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Non-disabled accounts for a login email.
///
/// Columns: id, company_id, role, password_hash, password_salt, is_active.
pub fn login_candidates(email: &str) -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::CompanyId,
            Users::Role,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::IsActive,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .build(SqliteQueryBuilder)
}

/// Identity used by the auth extractor.
///
/// Columns: id, company_id, role, email, is_active, is_disabled.
pub fn auth_lookup(user_id: &str) -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::CompanyId,
            Users::Role,
            Users::Email,
            Users::IsActive,
            Users::IsDisabled,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Whether a non-disabled account with `email` exists in the tenant
/// (`None` = platform level).
pub fn email_taken(company_id: Option<&str>, email: &str) -> Built {
    let tenant = match company_id {
        Some(id) => Expr::col(Users::CompanyId).eq(id),
        None => Expr::col(Users::CompanyId).is_null(),
    };
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(tenant)
        .and_where(Expr::col(Users::Email).eq(email))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .build(SqliteQueryBuilder)
}

/// Count platform administrators.
pub fn count_platform_admins() -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::col(Users::Role).eq(crate::Role::PlatformAdmin.as_str()))
        .build(SqliteQueryBuilder)
}

/// Count non-disabled accounts in a company (license seats in use).
pub fn count_seats(company_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::col(Users::CompanyId).eq(company_id))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .build(SqliteQueryBuilder)
}

/// Of `user_ids`, those that are non-disabled members of `company_id`.
pub fn filter_company_users(company_id: &str, user_ids: &[String]) -> Built {
    Query::select()
        .column(Users::Id)
        .from(Users::Table)
        .and_where(Expr::col(Users::CompanyId).eq(company_id))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .and_where(Expr::col(Users::Id).is_in(user_ids.iter().map(String::as_str)))
        .build(SqliteQueryBuilder)
}

/// Account waiting for activation. Columns: id.
pub fn get_by_activation_token(token: &str) -> Built {
    Query::select()
        .column(Users::Id)
        .from(Users::Table)
        .and_where(Expr::col(Users::ActivationToken).eq(token))
        .and_where(Expr::col(Users::IsDisabled).eq(false))
        .build(SqliteQueryBuilder)
}

// ── Writes ─────────────────────────────────────────────────────────────────

/// Values of a new account.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub company_id: Option<&'a str>,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: crate::Role,
    pub department: Option<&'a str>,
    pub job_title: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub password_salt: Option<&'a str>,
    pub is_active: bool,
    pub activation_token: Option<&'a str>,
}

/// INSERT a user.
pub fn insert(user: &NewUser<'_>) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::CompanyId,
            Users::Email,
            Users::FirstName,
            Users::LastName,
            Users::Role,
            Users::Department,
            Users::JobTitle,
            Users::PhoneNumber,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::IsActive,
            Users::ActivationToken,
        ])
        .values_panic([
            user.id.into(),
            opt_str(user.company_id),
            user.email.into(),
            user.first_name.into(),
            user.last_name.into(),
            user.role.as_str().into(),
            opt_str(user.department),
            opt_str(user.job_title),
            opt_str(user.phone_number),
            opt_str(user.password_hash),
            opt_str(user.password_salt),
            user.is_active.into(),
            opt_str(user.activation_token),
        ])
        .build(SqliteQueryBuilder)
}

/// Set the first password, activate, and burn the activation token.
pub fn activate(user_id: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .values([
            (Users::PasswordHash, password_hash.into()),
            (Users::PasswordSalt, password_salt.into()),
            (Users::IsActive, true.into()),
            (Users::ActivationToken, opt_str(None)),
        ])
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Disable an account. Disabled accounts cannot log in and free their email.
pub fn disable(user_id: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .values([
            (Users::IsDisabled, true.into()),
            (Users::IsActive, false.into()),
            (Users::ActivationToken, opt_str(None)),
        ])
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

pub fn refresh_insert(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Unexpired refresh token. Columns: user_id.
pub fn refresh_lookup(token_hash: &str) -> Built {
    Query::select()
        .column(RefreshTokens::UserId)
        .from(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .and_where(Expr::col(RefreshTokens::ExpiresAt).gt(super::now_expr()))
        .build(SqliteQueryBuilder)
}

pub fn refresh_delete(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_taken_handles_platform_scope() {
        let (sql, _) = email_taken(None, "a@b.co");
        assert!(sql.contains(r#""company_id" IS NULL"#));
        let (sql, values) = email_taken(Some("c1"), "a@b.co");
        assert!(sql.contains(r#""company_id" = ?"#));
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn user_select_has_eleven_columns() {
        let (sql, _) = get_by_id("u1");
        let select = sql.split(" FROM ").next().unwrap();
        assert_eq!(select.matches(',').count(), 10);
    }
}
