use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use super::{client_ip, record_audit};
use crate::auth::{AppState, Authenticated};
use crate::db::seed::new_user;
use crate::error::ApiError;
use crate::models::{
    AuthResponse, AuthUser, LoginRequest, RefreshRequest, RefreshResponse, SignupRequest, TokenKind,
    UserResponse,
};
use crate::policy::{self, LOCKOUT_MINUTES};
use crate::validation::{validate_login, validate_signup, FieldErrors};

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    credentials: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let credentials = credentials.into_inner();
    validate_login(&credentials).map_err(|errors| ApiError::validation(&errors, "Login failed"))?;

    let email = credentials.email.trim().to_lowercase();
    let mut user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !user.is_active() {
        return Err(ApiError::forbidden("Account is inactive"));
    }

    let now = Utc::now();
    if user.is_locked(now) {
        return Err(ApiError::forbidden(format!(
            "Security Protocol: Account locked due to multiple failed attempts. Please try again in {LOCKOUT_MINUTES} minutes."
        )));
    }

    if !bcrypt::verify(&credentials.password, &user.password)? {
        policy::register_failed_login(&mut user, now);
        state.repo.save_user(&user).await?;
        warn!(
            "Invalid password attempt for email: {} ({} consecutive)",
            email, user.failed_login_attempts
        );
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let session = Uuid::new_v4().to_string();
    policy::register_successful_login(&mut user, session.clone());
    let token = state.tokens.issue(&user, &session, TokenKind::Access)?;
    let refresh = state.tokens.issue(&user, &session, TokenKind::Refresh)?;
    state.repo.save_user(&user).await?;

    record_audit(
        state.repo.as_ref(),
        Some(user.id),
        "LOGIN_SUCCESS",
        "User logged in session initiated.".to_string(),
        client_ip(&req),
    )
    .await?;
    info!("User {} authenticated successfully", user.email);

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: AuthUser::from(&user),
        token,
        refresh,
    }))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(mut user): Authenticated,
) -> Result<HttpResponse, ApiError> {
    user.current_session = None;
    state.repo.save_user(&user).await?;
    record_audit(
        state.repo.as_ref(),
        Some(user.id),
        "LOGOUT",
        "User session terminated.".to_string(),
        client_ip(&req),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully logged out" })))
}

/// Trades a refresh token for a new access token in the same session.
pub async fn refresh(
    state: web::Data<AppState>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = state.resolve(&payload.refresh, TokenKind::Refresh).await?;
    let session = user
        .current_session
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Session has ended"))?;
    let access = state.tokens.issue(&user, session, TokenKind::Access)?;
    Ok(HttpResponse::Ok().json(RefreshResponse { access }))
}

pub async fn signup(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<SignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    validate_signup(&payload).map_err(|errors| ApiError::validation(&errors, "Signup failed"))?;

    let email = payload.email.trim().to_lowercase();
    if state.repo.find_user_by_email(&email).await?.is_some() {
        let mut errors = FieldErrors::default();
        errors.push("email", "user with this email already exists.");
        return Err(ApiError::validation(&errors, "Signup failed"));
    }

    let hashed_password = bcrypt::hash(&payload.password, state.bcrypt_cost)?;
    let mut user = new_user(
        payload.name.trim(),
        &email,
        hashed_password,
        payload.role.unwrap_or_default(),
    );
    user.phone = Some(payload.phone.trim().to_string());
    user.department = payload.department;
    user.roll_number = payload.roll_number;
    user.employee_id = payload.employee_id;
    user.designation = payload.designation;

    let user = state.repo.insert_user(user).await?;
    record_audit(
        state.repo.as_ref(),
        Some(user.id),
        "USER_REGISTERED",
        format!("New user {} registered as {}", user.username, user.role),
        client_ip(&req),
    )
    .await?;
    info!("Registered {} as {}", user.email, user.role);

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}
