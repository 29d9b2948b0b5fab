//! Company group query builders.

use sea_query::{
    Alias, Asterisk, Expr, Func, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder,
};

use super::tables::{CompanyGroups, GroupMembers, Users};
use super::{Built, opt_str};

/// Name of the group every company user belongs to.
pub const SYSTEM_GROUP_NAME: &str = "All Users";

/// Column order: id, company_id, name, description, is_system, member_count,
/// created_at.
pub fn group_columns(q: &mut SelectStatement) -> &mut SelectStatement {
    q.column((CompanyGroups::Table, CompanyGroups::Id))
        .column((CompanyGroups::Table, CompanyGroups::CompanyId))
        .column((CompanyGroups::Table, CompanyGroups::Name))
        .column((CompanyGroups::Table, CompanyGroups::Description))
        .column((CompanyGroups::Table, CompanyGroups::IsSystem))
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM group_members gm WHERE gm.group_id = company_groups.id)",
            ),
            Alias::new("member_count"),
        )
        .column((CompanyGroups::Table, CompanyGroups::CreatedAt))
}

pub fn insert(
    id: &str,
    company_id: &str,
    name: &str,
    description: Option<&str>,
    is_system: bool,
) -> Built {
    Query::insert()
        .into_table(CompanyGroups::Table)
        .columns([
            CompanyGroups::Id,
            CompanyGroups::CompanyId,
            CompanyGroups::Name,
            CompanyGroups::Description,
            CompanyGroups::IsSystem,
        ])
        .values_panic([
            id.into(),
            company_id.into(),
            name.into(),
            opt_str(description),
            is_system.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// A group, scoped to its company.
pub fn get(company_id: &str, group_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    group_columns(&mut q);
    q.from(CompanyGroups::Table)
        .and_where(Expr::col((CompanyGroups::Table, CompanyGroups::Id)).eq(group_id))
        .and_where(Expr::col((CompanyGroups::Table, CompanyGroups::CompanyId)).eq(company_id))
        .build(SqliteQueryBuilder)
}

/// Groups of a company by name. System groups only when asked for.
pub fn list(company_id: &str, include_system: bool) -> Built {
    let mut q = Query::select().to_owned();
    group_columns(&mut q);
    q.from(CompanyGroups::Table)
        .and_where(Expr::col((CompanyGroups::Table, CompanyGroups::CompanyId)).eq(company_id));
    if !include_system {
        q.and_where(Expr::col((CompanyGroups::Table, CompanyGroups::IsSystem)).eq(false));
    }
    q.order_by((CompanyGroups::Table, CompanyGroups::Name), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Whether `name` is already used in the company, ignoring case.
pub fn name_taken(company_id: &str, name: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(CompanyGroups::Table)
        .and_where(Expr::col(CompanyGroups::CompanyId).eq(company_id))
        .and_where(Expr::expr(Func::lower(Expr::col(CompanyGroups::Name))).eq(name.to_lowercase()))
        .build(SqliteQueryBuilder)
}

/// The company's system group. Columns: id.
pub fn system_group(company_id: &str) -> Built {
    Query::select()
        .column(CompanyGroups::Id)
        .from(CompanyGroups::Table)
        .and_where(Expr::col(CompanyGroups::CompanyId).eq(company_id))
        .and_where(Expr::col(CompanyGroups::IsSystem).eq(true))
        .build(SqliteQueryBuilder)
}

pub fn count_for_company(company_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(CompanyGroups::Table)
        .and_where(Expr::col(CompanyGroups::CompanyId).eq(company_id))
        .and_where(Expr::col(CompanyGroups::IsSystem).eq(false))
        .build(SqliteQueryBuilder)
}

pub fn delete(group_id: &str) -> Built {
    Query::delete()
        .from_table(CompanyGroups::Table)
        .and_where(Expr::col(CompanyGroups::Id).eq(group_id))
        .and_where(Expr::col(CompanyGroups::IsSystem).eq(false))
        .build(SqliteQueryBuilder)
}

// ── Members ────────────────────────────────────────────────────────────────

/// Add a member. Existing memberships are left alone.
pub fn add_member(group_id: &str, user_id: &str) -> Built {
    Query::insert()
        .into_table(GroupMembers::Table)
        .columns([GroupMembers::GroupId, GroupMembers::UserId])
        .values_panic([group_id.into(), user_id.into()])
        .on_conflict(
            OnConflict::columns([GroupMembers::GroupId, GroupMembers::UserId])
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

pub fn remove_member(group_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(GroupMembers::Table)
        .and_where(Expr::col(GroupMembers::GroupId).eq(group_id))
        .and_where(Expr::col(GroupMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Members of a group, in [`super::users::user_columns`] order.
pub fn members(group_id: &str) -> Built {
    let mut q = Query::select().to_owned();
    super::users::user_columns(&mut q);
    q.from(GroupMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((GroupMembers::Table, GroupMembers::UserId)),
        )
        .and_where(Expr::col((GroupMembers::Table, GroupMembers::GroupId)).eq(group_id))
        .order_by((Users::Table, Users::Email), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Ids of the users already in a group. Columns: user_id.
pub fn member_ids(group_id: &str) -> Built {
    Query::select()
        .column(GroupMembers::UserId)
        .from(GroupMembers::Table)
        .and_where(Expr::col(GroupMembers::GroupId).eq(group_id))
        .build(SqliteQueryBuilder)
}

/// Activated, non-disabled members, as campaign recipients.
///
/// Columns: id, email, first_name, last_name.
pub fn reachable_members(group_id: &str) -> Built {
    Query::select()
        .column((Users::Table, Users::Id))
        .column((Users::Table, Users::Email))
        .column((Users::Table, Users::FirstName))
        .column((Users::Table, Users::LastName))
        .from(GroupMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((GroupMembers::Table, GroupMembers::UserId)),
        )
        .and_where(Expr::col((GroupMembers::Table, GroupMembers::GroupId)).eq(group_id))
        .and_where(Expr::col((Users::Table, Users::IsActive)).eq(true))
        .and_where(Expr::col((Users::Table, Users::IsDisabled)).eq(false))
        .order_by((Users::Table, Users::Email), Order::Asc)
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_check_is_case_insensitive() {
        let (sql, values) = name_taken("c1", "Finance");
        assert!(sql.contains("LOWER"));
        assert_eq!(
            values.0[2],
            sea_query::Value::String(Some(Box::new("finance".into())))
        );
    }

    #[test]
    fn listing_hides_system_groups_by_default() {
        let (sql, _) = list("c1", false);
        assert!(sql.contains(r#""company_groups"."is_system" = "#));
        let (sql, _) = list("c1", true);
        assert!(!sql.contains(r#""company_groups"."is_system" = "#));
    }
}
