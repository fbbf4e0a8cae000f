use actix_web::{web, HttpRequest, HttpResponse};

use super::{client_ip, record_audit, require, Lookup, NOT_FOUND};
use crate::auth::{AppState, Authenticated};
use crate::db::Repository;
use crate::error::ApiError;
use crate::models::{Resource, ResourcePayload, ResourceResponse, ResourceStatus, Role};
use crate::policy::can_manage_resources;
use crate::validation::FieldErrors;

fn to_response(resource: &Resource, lookup: &Lookup) -> ResourceResponse {
    ResourceResponse {
        id: resource.id,
        name: resource.name.clone(),
        kind: resource.kind,
        capacity: resource.capacity,
        status: resource.status,
        lab_in_charge: resource.lab_in_charge,
        lab_in_charge_name: resource.lab_in_charge.and_then(|id| lookup.user_name(id)),
        assigned_staff: resource.assigned_staff,
        assigned_staff_name: resource.assigned_staff.and_then(|id| lookup.user_name(id)),
    }
}

/// Lab in-charge and assigned staff must point at users holding that role.
async fn check_assignees(repo: &dyn Repository, payload: &ResourcePayload, errors: &mut FieldErrors) -> Result<(), ApiError> {
    for (field, id, role) in [
        ("lab_in_charge", payload.lab_in_charge.flatten(), Role::LabIncharge),
        ("assigned_staff", payload.assigned_staff.flatten(), Role::Staff),
    ] {
        let Some(id) = id else { continue };
        match repo.find_user(id).await? {
            Some(user) if user.role == role => {}
            _ => errors.push(field, format!("Invalid pk \"{id}\" - object does not exist.")),
        }
    }
    Ok(())
}

pub async fn list_resources(
    state: web::Data<AppState>,
    _caller: Authenticated,
) -> Result<HttpResponse, ApiError> {
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    let resources: Vec<ResourceResponse> = state
        .repo
        .list_resources()
        .await?
        .iter()
        .map(|r| to_response(r, &lookup))
        .collect();
    Ok(HttpResponse::Ok().json(resources))
}

pub async fn get_resource(
    state: web::Data<AppState>,
    _caller: Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let resource = state
        .repo
        .find_resource(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(to_response(&resource, &lookup)))
}

pub async fn create_resource(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    payload: web::Json<ResourcePayload>,
) -> Result<HttpResponse, ApiError> {
    require(can_manage_resources(caller.role))?;
    let payload = payload.into_inner();

    let mut errors = FieldErrors::default();
    let name = payload.name.clone().map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if name.is_none() {
        errors.push("name", "This field is required.");
    }
    if payload.kind.is_none() {
        errors.push("type", "This field is required.");
    }
    if payload.capacity.is_none() {
        errors.push("capacity", "This field is required.");
    }
    check_assignees(state.repo.as_ref(), &payload, &mut errors).await?;
    let (Some(name), Some(kind), Some(capacity), true) =
        (name, payload.kind, payload.capacity, errors.is_empty())
    else {
        return Err(ApiError::validation(&errors, "Invalid resource"));
    };

    let resource = state
        .repo
        .insert_resource(Resource {
            id: 0,
            name,
            kind,
            capacity,
            status: payload.status.unwrap_or(ResourceStatus::Active),
            lab_in_charge: payload.lab_in_charge.flatten(),
            assigned_staff: payload.assigned_staff.flatten(),
        })
        .await?;
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "RESOURCE_CREATED",
        format!("Created resource {} ({})", resource.name, resource.kind.as_str()),
        client_ip(&req),
    )
    .await?;

    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Created().json(to_response(&resource, &lookup)))
}

/// PUT requires the core fields; PATCH takes any subset.
pub async fn update_resource(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
    payload: web::Json<ResourcePayload>,
) -> Result<HttpResponse, ApiError> {
    require(can_manage_resources(caller.role))?;
    let mut resource = state
        .repo
        .find_resource(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let payload = payload.into_inner();

    let mut errors = FieldErrors::default();
    if req.method() == actix_web::http::Method::PUT {
        for (field, missing) in [
            ("name", payload.name.is_none()),
            ("type", payload.kind.is_none()),
            ("capacity", payload.capacity.is_none()),
        ] {
            if missing {
                errors.push(field, "This field is required.");
            }
        }
    }
    if payload.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
        errors.push("name", "This field may not be blank.");
    }
    check_assignees(state.repo.as_ref(), &payload, &mut errors).await?;
    if !errors.is_empty() {
        return Err(ApiError::validation(&errors, "Invalid resource"));
    }

    if let Some(name) = payload.name {
        resource.name = name.trim().to_string();
    }
    resource.kind = payload.kind.unwrap_or(resource.kind);
    resource.capacity = payload.capacity.unwrap_or(resource.capacity);
    resource.status = payload.status.unwrap_or(resource.status);
    if let Some(lab_in_charge) = payload.lab_in_charge {
        resource.lab_in_charge = lab_in_charge;
    }
    if let Some(assigned_staff) = payload.assigned_staff {
        resource.assigned_staff = assigned_staff;
    }
    state.repo.save_resource(&resource).await?;

    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "RESOURCE_UPDATED",
        format!("Updated resource {} (status {})", resource.name, resource.status.as_str()),
        client_ip(&req),
    )
    .await?;

    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(to_response(&resource, &lookup)))
}

pub async fn delete_resource(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require(can_manage_resources(caller.role))?;
    let id = path.into_inner();
    if !state.repo.delete_resource(id).await? {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "RESOURCE_DELETED",
        format!("Deleted resource {id}"),
        client_ip(&req),
    )
    .await?;
    Ok(HttpResponse::NoContent().finish())
}
