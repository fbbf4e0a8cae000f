use actix_web::{web, HttpResponse};

use super::{require, Lookup, NOT_FOUND};
use crate::auth::{AppState, Authenticated};
use crate::error::ApiError;
use crate::models::{AuditLog, AuditLogResponse, Role};

fn to_response(entry: &AuditLog, lookup: &Lookup) -> AuditLogResponse {
    AuditLogResponse {
        id: entry.id,
        user: entry.user,
        user_name: entry.user.and_then(|id| lookup.user_name(id)),
        action: entry.action.clone(),
        details: entry.details.clone(),
        timestamp: entry.timestamp,
        ip_address: entry.ip_address.clone(),
    }
}

pub async fn list_audit(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    let entries: Vec<AuditLogResponse> = state
        .repo
        .list_audit()
        .await?
        .iter()
        .map(|e| to_response(e, &lookup))
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

pub async fn get_audit(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(caller.role == Role::Admin)?;
    let entry = state
        .repo
        .find_audit(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(to_response(&entry, &lookup)))
}
