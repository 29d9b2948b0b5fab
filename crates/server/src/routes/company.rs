use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;

use awarenow_api::db::users::NewUser;
use awarenow_api::{
    AddGroupMembersRequest, AddGroupMembersResponse, CreateCompanyUserRequest, CreateGroupRequest,
    GroupDetailResponse, GroupListQuery, GroupResponse, InvitedUserResponse, ListGroupsResponse,
    ListUsersResponse, OkResponse, Role, UserResponse, crypto, db, service,
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::mailer::Mailer;
use crate::routes::auth::{AuthUser, send_activation_email};
use crate::storage::{
    Db, group_from_row, is_constraint_violation, sq_execute, sq_query_map, sq_query_opt,
    sq_query_row, user_from_row,
};

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

/// A pending account to create inside a company.
pub struct Invite<'a> {
    pub company_id: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub department: Option<&'a str>,
    pub job_title: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    /// Non-system groups to join besides "All Users".
    pub group_ids: &'a [String],
}

/// Create an inactive account with an activation token.
///
/// Enforces the per-company email uniqueness and the plan's seat limit,
/// adds the user to the system group and the chosen groups, and gives
/// employees a profile. Returns the user and the activation token.
pub fn invite_user(conn: &mut Connection, invite: &Invite<'_>) -> Result<(UserResponse, String), ApiErr> {
    let company_id = invite.company_id;

    let taken: bool = sq_query_row(conn, db::users::email_taken(Some(company_id), invite.email), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("email check"))?;
    if taken {
        return Err(ApiErr::conflict("a user with this email already exists in the company"));
    }

    let seat_limit: Option<i64> = sq_query_opt(conn, db::companies::seat_limit(company_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("seat limit"))?;
    if let Some(max_users) = seat_limit {
        let seats: i64 = sq_query_row(conn, db::users::count_seats(company_id), |row| row.get(0))
            .map_err(ApiErr::from_db("count seats"))?;
        if seats >= max_users {
            return Err(ApiErr::forbidden(format!(
                "the subscription plan allows at most {max_users} users"
            )));
        }
    }

    let system_group: String = sq_query_opt(conn, db::groups::system_group(company_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("system group lookup"))?
    .ok_or_else(|| ApiErr::internal("company has no system group"))?;

    let mut groups = Vec::with_capacity(invite.group_ids.len());
    for group_id in invite.group_ids {
        let group = sq_query_opt(conn, db::groups::get(company_id, group_id), group_from_row)
            .map_err(ApiErr::from_db("group lookup"))?
            .filter(|g| !g.is_system)
            .ok_or_else(|| ApiErr::bad_request(format!("unknown group {group_id}")))?;
        groups.push(group.id);
    }

    let id = service::new_id();
    let token = crypto::generate_token()?;
    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    sq_execute(
        &tx,
        db::users::insert(&NewUser {
            id: &id,
            company_id: Some(company_id),
            email: invite.email,
            first_name: invite.first_name,
            last_name: invite.last_name,
            role: invite.role,
            department: invite.department,
            job_title: invite.job_title,
            phone_number: invite.phone_number,
            password_hash: None,
            password_salt: None,
            is_active: false,
            activation_token: Some(&token),
        }),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("a user with this email already exists in the company")
        } else {
            ApiErr::from_db("create user")(e)
        }
    })?;
    for group_id in std::iter::once(&system_group).chain(&groups) {
        sq_execute(&tx, db::groups::add_member(group_id, &id))
            .map_err(ApiErr::from_db("add group member"))?;
    }
    if invite.role == Role::Employee {
        sq_execute(&tx, db::learning::profile_insert(&id))
            .map_err(ApiErr::from_db("create profile"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    let user = sq_query_row(conn, db::users::get_by_id(&id), user_from_row)
        .map_err(ApiErr::from_db("reload user"))?;
    tracing::info!(user_id = %id, %company_id, role = %invite.role, "user invited");
    Ok((user, token))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// POST /api/company/users — create a pending account and mail its
/// activation link.
pub async fn create_user(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    State(mailer): State<Mailer>,
    user: AuthUser,
    Json(req): Json<CreateCompanyUserRequest>,
) -> Result<(StatusCode, Json<InvitedUserResponse>), ApiErr> {
    let company_id = user.company_admin_scope()?;
    let role = service::validate_company_role(req.role)?;
    let email = service::validate_email(&req.email)?;
    let first_name = service::validate_name("first_name", &req.first_name, 100)?;
    let last_name = service::validate_name("last_name", &req.last_name, 100)?;
    let department = service::non_blank(req.department.as_deref());
    let job_title = service::non_blank(req.job_title.as_deref());
    let phone_number = service::non_blank(req.phone_number.as_deref());

    let (created, token) = {
        let mut conn = db.conn();
        invite_user(
            &mut conn,
            &Invite {
                company_id,
                email: &email,
                first_name: &first_name,
                last_name: &last_name,
                role,
                department: department.as_deref(),
                job_title: job_title.as_deref(),
                phone_number: phone_number.as_deref(),
                group_ids: &req.group_ids,
            },
        )?
    };

    let activation_sent =
        send_activation_email(&mailer, &config, &created.email, &created.first_name, &token).await;
    Ok((
        StatusCode::CREATED,
        Json(InvitedUserResponse {
            user: created,
            activation_sent,
        }),
    ))
}

/// GET /api/company/users
pub async fn list_users(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListUsersResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let users = sq_query_map(&conn, db::users::list_by_company(company_id), user_from_row)
        .map_err(ApiErr::from_db("list users"))?;
    Ok(Json(ListUsersResponse { users }))
}

/// POST /api/company/users/:id/disable
pub async fn disable_user(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    if id == user.user_id {
        return Err(ApiErr::bad_request("you cannot disable your own account"));
    }
    let conn = db.conn();
    let target = sq_query_opt(&conn, db::users::get_by_id(&id), user_from_row)
        .map_err(ApiErr::from_db("user lookup"))?
        .filter(|u| u.company_id.as_deref() == Some(company_id))
        .ok_or_else(|| ApiErr::not_found("user not found"))?;
    if !target.is_disabled {
        sq_execute(&conn, db::users::disable(&id)).map_err(ApiErr::from_db("disable user"))?;
        tracing::info!(user_id = %id, "user disabled");
    }
    sq_query_row(&conn, db::users::get_by_id(&id), user_from_row)
        .map(Json)
        .map_err(ApiErr::from_db("reload user"))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn load_group(conn: &Connection, company_id: &str, group_id: &str) -> Result<GroupResponse, ApiErr> {
    sq_query_opt(conn, db::groups::get(company_id, group_id), group_from_row)
        .map_err(ApiErr::from_db("group lookup"))?
        .ok_or_else(|| ApiErr::not_found("group not found"))
}

/// Of `user_ids`, the non-disabled users of the company, deduplicated.
fn company_members(conn: &Connection, company_id: &str, user_ids: &[String]) -> Result<Vec<String>, ApiErr> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    sq_query_map(conn, db::users::filter_company_users(company_id, user_ids), |row| row.get(0))
        .map_err(ApiErr::from_db("filter users"))
}

/// POST /api/company/groups — name unique per company, ignoring case.
pub async fn create_group(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiErr> {
    let company_id = user.company_admin_scope()?;
    let name = service::validate_name("name", &req.name, 100)?;
    let description = service::non_blank(req.description.as_deref());

    let mut conn = db.conn();
    let taken: bool = sq_query_row(&conn, db::groups::name_taken(company_id, &name), |row| row.get(0))
        .map_err(ApiErr::from_db("group name check"))?;
    if taken {
        return Err(ApiErr::conflict("a group with this name already exists"));
    }
    let members = company_members(&conn, company_id, &req.user_ids)?;

    let id = service::new_id();
    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    sq_execute(
        &tx,
        db::groups::insert(&id, company_id, &name, description.as_deref(), false),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("a group with this name already exists")
        } else {
            ApiErr::from_db("create group")(e)
        }
    })?;
    for member in &members {
        sq_execute(&tx, db::groups::add_member(&id, member))
            .map_err(ApiErr::from_db("add group member"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;

    Ok((StatusCode::CREATED, Json(load_group(&conn, company_id, &id)?)))
}

/// GET /api/company/groups — non-system groups unless `include_system=true`.
pub async fn list_groups(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<GroupListQuery>,
) -> Result<Json<ListGroupsResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let groups = sq_query_map(
        &conn,
        db::groups::list(company_id, q.include_system.unwrap_or(false)),
        group_from_row,
    )
    .map_err(ApiErr::from_db("list groups"))?;
    Ok(Json(ListGroupsResponse { groups }))
}

/// GET /api/company/groups/:id — group with its members.
pub async fn get_group(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<GroupDetailResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let group = load_group(&conn, company_id, &id)?;
    let members = sq_query_map(&conn, db::groups::members(&id), user_from_row)
        .map_err(ApiErr::from_db("group members"))?;
    Ok(Json(GroupDetailResponse { group, members }))
}

/// POST /api/company/groups/:id/members — add same-company users that are
/// not members yet.
pub async fn add_members(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<AddGroupMembersRequest>,
) -> Result<Json<AddGroupMembersResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let mut conn = db.conn();
    load_group(&conn, company_id, &id)?;

    let candidates = company_members(&conn, company_id, &req.user_ids)?;
    let tx = conn.transaction().map_err(ApiErr::from_db("begin"))?;
    let mut added = 0;
    for member in &candidates {
        added += sq_execute(&tx, db::groups::add_member(&id, member))
            .map_err(ApiErr::from_db("add group member"))?;
    }
    tx.commit().map_err(ApiErr::from_db("commit"))?;
    Ok(Json(AddGroupMembersResponse { added }))
}

/// DELETE /api/company/groups/:id/members/:user_id
pub async fn remove_member(
    State(db): State<Db>,
    user: AuthUser,
    Path((id, member_id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let group = load_group(&conn, company_id, &id)?;
    if group.is_system {
        return Err(ApiErr::bad_request("members cannot be removed from a system group"));
    }
    let removed = sq_execute(&conn, db::groups::remove_member(&id, &member_id))
        .map_err(ApiErr::from_db("remove group member"))?;
    if removed == 0 {
        return Err(ApiErr::not_found("user is not a member of this group"));
    }
    Ok(Json(OkResponse { ok: true }))
}

/// DELETE /api/company/groups/:id — system groups cannot be deleted.
pub async fn delete_group(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    let company_id = user.company_admin_scope()?;
    let conn = db.conn();
    let group = load_group(&conn, company_id, &id)?;
    if group.is_system {
        return Err(ApiErr::bad_request("system groups cannot be deleted"));
    }
    sq_execute(&conn, db::groups::delete(&id)).map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("group is targeted by a phishing campaign")
        } else {
            ApiErr::from_db("delete group")(e)
        }
    })?;
    Ok(Json(OkResponse { ok: true }))
}
