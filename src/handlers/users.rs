use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;

use super::{client_ip, record_audit, require, NOT_FOUND};
use crate::auth::{AppState, Authenticated};
use crate::db::BookingFilter;
use crate::error::ApiError;
use crate::models::{
    BookingStatus, DashboardStats, Role, StudentStats, UpdateUserRequest, User, UserResponse,
    UserStatus,
};
use crate::policy::{is_staff_or_above, BookingScope};
use crate::validation::{is_valid_email, FieldErrors};

async fn load_user(state: &AppState, id: i64) -> Result<User, ApiError> {
    state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

#[derive(Deserialize)]
pub struct UserQuery {
    role: Option<Role>,
}

pub async fn list_users(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, ApiError> {
    require(is_staff_or_above(caller.role))?;
    let users = match query.role {
        Some(role) => state.repo.users_with_role(role).await?,
        None => state.repo.list_users().await?,
    };
    let users: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    let user = load_user(&state, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// Serves both PUT and PATCH; absent fields keep their value.
pub async fn update_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    let mut user = load_user(&state, path.into_inner()).await?;
    let changes = payload.into_inner();

    if let Some(email) = changes.email {
        let email = email.trim().to_lowercase();
        let mut errors = FieldErrors::default();
        if !is_valid_email(&email) {
            errors.push("email", "Enter a valid email address.");
        } else if email != user.email && state.repo.find_user_by_email(&email).await?.is_some() {
            errors.push("email", "user with this email already exists.");
        }
        if !errors.is_empty() {
            return Err(ApiError::validation(&errors, "Update failed"));
        }
        user.email = email;
    }
    if let Some(username) = changes.username {
        user.username = username;
    }
    if let Some(role) = changes.role {
        user.role = role;
    }
    if let Some(status) = changes.status {
        user.status = status;
    }
    user.phone = changes.phone.or(user.phone);
    user.department = changes.department.or(user.department);
    user.roll_number = changes.roll_number.or(user.roll_number);
    user.employee_id = changes.employee_id.or(user.employee_id);
    user.designation = changes.designation.or(user.designation);

    state.repo.save_user(&user).await?;
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "USER_UPDATED",
        format!("Updated user {}", user.username),
        client_ip(&req),
    )
    .await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// Users are never removed, only deactivated.
pub async fn deactivate_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    let mut user = load_user(&state, path.into_inner()).await?;
    user.status = UserStatus::Inactive;
    user.current_session = None;
    state.repo.save_user(&user).await?;
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "USER_DEACTIVATED",
        format!("Deactivated user {}", user.username),
        client_ip(&req),
    )
    .await?;
    info!("User {} deactivated by {}", user.email, caller.email);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn student_stats(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    let today = Utc::now().date_naive();
    let own = BookingFilter::scoped(BookingScope::Owner(caller.id));

    let mut upcoming = own.clone().with_status(BookingStatus::Approved);
    upcoming.on_or_after = Some(today);
    let mut completed = own.clone().with_status(BookingStatus::Approved);
    completed.before = Some(today);
    let pending = own.with_status(BookingStatus::Pending);

    Ok(HttpResponse::Ok().json(StudentStats {
        upcoming: state.repo.count_bookings(&upcoming).await?,
        pending: state.repo.count_bookings(&pending).await?,
        completed: state.repo.count_bookings(&completed).await?,
    }))
}

pub async fn dashboard_stats(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    Ok(HttpResponse::Ok().json(DashboardStats {
        total_users: state.repo.count_users().await?,
        active_bookings: state
            .repo
            .count_bookings(&BookingFilter::all().with_status(BookingStatus::Approved))
            .await?,
        pending_approvals: state
            .repo
            .count_bookings(&BookingFilter::all().with_status(BookingStatus::Pending))
            .await?,
        total_resources: state.repo.count_resources().await?,
    }))
}
