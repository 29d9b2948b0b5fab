//! Aggregate queries behind the platform and company dashboards.

use sea_query::{
    Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder,
};

use super::Built;
use super::tables::{Companies, Courses, EmployeeCourseAssignments, Users};
use crate::{AssignmentStatus, CompanyStatus, Role};

/// Platform-wide counters.
///
/// Columns: total_courses, published_courses, active_companies,
/// avg_quiz_score (NULL without attempts), total_quiz_attempts.
pub fn platform_totals() -> Built {
    Query::select()
        .expr_as(Expr::cust("(SELECT COUNT(*) FROM courses)"), Alias::new("total_courses"))
        .expr_as(
            Expr::cust("(SELECT COUNT(*) FROM courses WHERE is_published = 1)"),
            Alias::new("published_courses"),
        )
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM companies WHERE status = ?)",
                [CompanyStatus::Active.as_str()],
            ),
            Alias::new("active_companies"),
        )
        .expr_as(Expr::cust("(SELECT AVG(score) FROM quiz_attempts)"), Alias::new("avg_quiz_score"))
        .expr_as(
            Expr::cust("(SELECT COUNT(*) FROM quiz_attempts)"),
            Alias::new("total_quiz_attempts"),
        )
        .build(SqliteQueryBuilder)
}

/// Join assignments to their employee, optionally scoped to one company.
fn scoped_assignments(q: &mut SelectStatement, company_id: Option<&str>) {
    q.from(EmployeeCourseAssignments::Table).inner_join(
        Users::Table,
        Expr::col((Users::Table, Users::Id))
            .equals((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::EmployeeId)),
    );
    if let Some(company_id) = company_id {
        q.and_where(Expr::col((Users::Table, Users::CompanyId)).eq(company_id));
    }
}

/// Overdue: a due date before `today` and not completed.
fn overdue_filter(q: &mut SelectStatement, today: &str) {
    q.and_where(
        Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::DueDate))
            .is_not_null(),
    )
    .and_where(
        Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::DueDate)).lt(today),
    )
    .and_where(
        Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status))
            .ne(AssignmentStatus::Completed.as_str()),
    );
}

/// Assignment counts by status. Columns: status, count.
pub fn assignment_status_counts(company_id: Option<&str>) -> Built {
    let mut q = Query::select();
    q.column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status))
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"));
    scoped_assignments(&mut q, company_id);
    q.group_by_col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status))
        .build(SqliteQueryBuilder)
}

pub fn overdue_count(company_id: Option<&str>, today: &str) -> Built {
    let mut q = Query::select();
    q.expr(Func::count(Expr::col(Asterisk)));
    scoped_assignments(&mut q, company_id);
    overdue_filter(&mut q, today);
    q.build(SqliteQueryBuilder)
}

/// Oldest-due overdue assignments.
///
/// Columns: assignment id, employee email, course title, due_date, status.
pub fn overdue_list(today: &str, limit: u64) -> Built {
    let mut q = Query::select();
    q.column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Id))
        .column((Users::Table, Users::Email))
        .column((Courses::Table, Courses::Title))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::DueDate))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status));
    scoped_assignments(&mut q, None);
    q.inner_join(
        Courses::Table,
        Expr::col((Courses::Table, Courses::Id))
            .equals((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CourseId)),
    );
    overdue_filter(&mut q, today);
    q.order_by(
        (EmployeeCourseAssignments::Table, EmployeeCourseAssignments::DueDate),
        Order::Asc,
    )
    .limit(limit)
    .build(SqliteQueryBuilder)
}

/// Most recent completions.
///
/// Columns: employee email, company name, course title, completed_at.
pub fn recent_completions(limit: u64) -> Built {
    let mut q = Query::select();
    q.column((Users::Table, Users::Email))
        .column((Companies::Table, Companies::Name))
        .column((Courses::Table, Courses::Title))
        .column((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CompletedAt));
    scoped_assignments(&mut q, None);
    q.inner_join(
        Courses::Table,
        Expr::col((Courses::Table, Courses::Id))
            .equals((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CourseId)),
    )
    .inner_join(
        Companies::Table,
        Expr::col((Companies::Table, Companies::Id)).equals((Users::Table, Users::CompanyId)),
    )
    .and_where(
        Expr::col((EmployeeCourseAssignments::Table, EmployeeCourseAssignments::Status))
            .eq(AssignmentStatus::Completed.as_str()),
    )
    .order_by(
        (EmployeeCourseAssignments::Table, EmployeeCourseAssignments::CompletedAt),
        Order::Desc,
    )
    .limit(limit)
    .build(SqliteQueryBuilder)
}

/// Active companies with their headcount.
///
/// Columns: name, employee_count, completed_courses.
pub fn company_summary(limit: u64) -> Built {
    Query::select()
        .column(Companies::Name)
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM users u WHERE u.company_id = companies.id \
                 AND u.role = ? AND u.is_disabled = 0)",
                [Role::Employee.as_str()],
            ),
            Alias::new("employee_count"),
        )
        .expr_as(
            Expr::cust(
                "(SELECT COUNT(*) FROM employee_course_assignments a \
                 JOIN users u ON u.id = a.employee_id \
                 WHERE u.company_id = companies.id AND a.status = 'completed')",
            ),
            Alias::new("completed_courses"),
        )
        .from(Companies::Table)
        .and_where(Expr::col(Companies::Status).eq(CompanyStatus::Active.as_str()))
        .order_by(Companies::Name, Order::Asc)
        .limit(limit)
        .build(SqliteQueryBuilder)
}

/// Company headline numbers.
///
/// Columns: employee_count, group_count, avg_awareness_score (NULL without
/// profiles).
pub fn company_totals(company_id: &str) -> Built {
    Query::select()
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM users WHERE company_id = ? AND role = ? AND is_disabled = 0)",
                [company_id, Role::Employee.as_str()],
            ),
            Alias::new("employee_count"),
        )
        .expr_as(
            Expr::cust_with_values(
                "(SELECT COUNT(*) FROM company_groups WHERE company_id = ? AND is_system = 0)",
                [company_id],
            ),
            Alias::new("group_count"),
        )
        .expr_as(
            Expr::cust_with_values(
                "(SELECT AVG(p.awareness_score) FROM employee_profiles p \
                 JOIN users u ON u.id = p.user_id \
                 WHERE u.company_id = ? AND u.is_disabled = 0)",
                [company_id],
            ),
            Alias::new("avg_awareness_score"),
        )
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_scope_filters_on_employee_company() {
        let (sql, values) = assignment_status_counts(Some("co1"));
        assert!(sql.contains(r#""users"."company_id" = ?"#));
        assert!(sql.contains("GROUP BY"));
        assert_eq!(values.0.len(), 1);
        let (sql, _) = assignment_status_counts(None);
        assert!(!sql.contains("company_id"));
    }

    #[test]
    fn overdue_excludes_completed() {
        let (sql, values) = overdue_count(None, "2025-03-01");
        assert!(sql.contains(r#""due_date" < ?"#));
        assert!(sql.contains(r#""status" <> ?"#));
        assert_eq!(values.0.len(), 2);
    }
}
