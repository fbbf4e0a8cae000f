use actix_web::{web, HttpResponse};
use log::debug;
use serde_json::json;

use super::NOT_FOUND;
use crate::auth::{AppState, Authenticated};
use crate::error::ApiError;
use crate::models::{Notification, NotificationPatch, NotificationResponse, User};

/// Someone else's notification reads as missing.
async fn load_own(state: &AppState, caller: &User, id: i64) -> Result<Notification, ApiError> {
    state
        .repo
        .find_notification(id)
        .await?
        .filter(|n| n.user == caller.id)
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

pub async fn list_notifications(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    let notifications: Vec<NotificationResponse> = state
        .repo
        .notifications_for(caller.id)
        .await?
        .iter()
        .map(NotificationResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn update_notification(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
    payload: web::Json<NotificationPatch>,
) -> Result<HttpResponse, ApiError> {
    let mut notification = load_own(&state, &caller, path.into_inner()).await?;
    notification.is_read = payload.is_read;
    state.repo.save_notification(&notification).await?;
    Ok(HttpResponse::Ok().json(NotificationResponse::from(&notification)))
}

pub async fn delete_notification(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let notification = load_own(&state, &caller, path.into_inner()).await?;
    state.repo.delete_notification(notification.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn mark_all_read(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    let updated = state.repo.mark_all_read(caller.id).await?;
    debug!("Marked {} notifications read for {}", updated, caller.id);
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}
