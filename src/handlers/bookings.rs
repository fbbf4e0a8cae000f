use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use super::{after_commit, client_ip, notify, record_audit, require, Lookup, NOT_FOUND};
use crate::auth::{AppState, Authenticated};
use crate::db::BookingFilter;
use crate::error::{ApiError, StoreError};
use crate::models::{
    AvailabilityQuery, Booking, BookingResponse, BookingStatus, BookingType, CreateBookingRequest,
    DecisionRequest, DecisionResponse, Resource, ResourceStatus, ResourceType, Role, User,
};
use crate::policy::{self, ApproverRoute, BookingScope};
use crate::schedule::{parse_date, parse_time};
use crate::validation::{validate_justification, FieldErrors};

fn to_response(booking: &Booking, lookup: &Lookup) -> BookingResponse {
    let owner = lookup.user(booking.user);
    BookingResponse {
        id: booking.id,
        user: booking.user,
        user_name: owner.map(|u| u.username.clone()).unwrap_or_default(),
        user_role: owner.map(|u| u.role.to_string()).unwrap_or_default(),
        user_dept: owner.and_then(|u| u.department.clone()),
        user_id_ref: owner.and_then(User::id_ref),
        resource: booking.resource,
        resource_name: lookup.resource_name(booking.resource).unwrap_or_default(),
        booking_date: booking.booking_date,
        start_time: booking.start_time,
        end_time: booking.end_time,
        booking_type: booking.booking_type,
        justification: booking.justification.clone(),
        remarks: booking.remarks.clone(),
        priority_level: booking.priority_level,
        status: booking.status,
        created_at: booking.created_at,
    }
}

async fn scope_for(state: &AppState, user: &User) -> Result<BookingScope, ApiError> {
    let managed = if user.role == Role::LabIncharge {
        state.repo.managed_labs(user.id).await?
    } else {
        Vec::new()
    };
    let assigned = if user.role == Role::Staff {
        state
            .repo
            .assigned_resources(user.id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect()
    } else {
        Vec::new()
    };
    Ok(policy::booking_scope(user, managed, assigned))
}

/// Bookings outside the caller's scope read as missing.
async fn load_visible(state: &AppState, user: &User, id: i64) -> Result<(Booking, Resource), ApiError> {
    let booking = state
        .repo
        .find_booking(id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    if !scope_for(state, user).await?.admits(&booking) {
        return Err(ApiError::not_found(NOT_FOUND));
    }
    let resource = state
        .repo
        .find_resource(booking.resource)
        .await?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;
    Ok((booking, resource))
}

/// Picks the consultation space of the staff member with `employee_id`.
async fn meeting_space(state: &AppState, employee_id: &str) -> Result<Resource, ApiError> {
    let staff = state
        .repo
        .find_staff_by_employee_id(employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Identified Staff ID not found in institutional records."))?;
    if let Some(own) = state.repo.assigned_resources(staff.id).await?.into_iter().next() {
        return Ok(own);
    }
    state
        .repo
        .first_of_type(ResourceType::MeetingRoom)
        .await?
        .ok_or_else(|| ApiError::bad_request("Target faculty has no assigned consultation space."))
}

async fn notify_approvers(state: &AppState, booking: &Booking, resource: &Resource, requester: &User) -> Result<(), StoreError> {
    let message = format!(
        "New Request: {} is requesting access to {} on {}.",
        requester.username, resource.name, booking.booking_date
    );
    match policy::approver_route(booking.booking_type, resource) {
        ApproverRoute::LabInCharge(user) | ApproverRoute::AssignedStaff(user) => {
            notify(state.repo.as_ref(), user, message).await?;
        }
        ApproverRoute::Admins => {
            for admin in state.repo.users_with_role(Role::Admin).await? {
                notify(state.repo.as_ref(), admin.id, message.clone()).await?;
            }
        }
    }
    Ok(())
}

pub async fn list_bookings(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    let scope = scope_for(&state, &caller).await?;
    let bookings = state.repo.list_bookings(&BookingFilter::scoped(scope)).await?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    let body: Vec<BookingResponse> = bookings.iter().map(|b| to_response(b, &lookup)).collect();
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_booking(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let (booking, _) = load_visible(&state, &caller, path.into_inner()).await?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(to_response(&booking, &lookup)))
}

pub async fn create_booking(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    payload: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    if !caller.is_active() {
        return Err(ApiError::forbidden("Inactive users cannot initiate requests"));
    }

    let mut kind = payload.booking_type.unwrap_or_default();
    let date = parse_date(&payload.booking_date)
        .ok_or_else(|| ApiError::bad_request("Invalid date format provided."))?;
    let (start, end) = match (parse_time(&payload.start_time), parse_time(&payload.end_time)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(ApiError::bad_request("Invalid time format provided.")),
    };
    policy::check_duration(caller.role, kind, start, end).map_err(ApiError::bad_request)?;

    let staff_id = payload
        .staff_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let resource = match (payload.resource, staff_id) {
        (Some(id), _) => state
            .repo
            .find_resource(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Resource not found"))?,
        (None, Some(employee_id)) => {
            kind = BookingType::Meeting;
            meeting_space(&state, employee_id).await?
        }
        (None, None) => {
            let mut errors = FieldErrors::default();
            errors.push("resource", "This field is required.");
            return Err(ApiError::validation(&errors, "Invalid booking"));
        }
    };

    if let Err(message) = validate_justification(kind, payload.justification.as_deref()) {
        let mut errors = FieldErrors::default();
        errors.push("justification", message);
        return Err(ApiError::validation(&errors, "Invalid booking"));
    }

    if resource.status != ResourceStatus::Active {
        return Err(ApiError::bad_request(format!(
            "Resource status: {}",
            resource.status.as_str()
        )));
    }

    let now = Utc::now();
    let status = policy::initial_status(caller.role, kind);
    let booking = state
        .repo
        .insert_booking(
            Booking {
                id: 0,
                user: caller.id,
                resource: resource.id,
                booking_date: date,
                start_time: start,
                end_time: end,
                booking_type: kind,
                justification: payload.justification.map(|j| j.trim().to_string()),
                remarks: None,
                priority_level: policy::priority_for(caller.role, kind),
                status,
                created_at: now,
                updated_at: now,
            },
            true,
        )
        .await?;

    after_commit(
        "audit",
        record_audit(
            state.repo.as_ref(),
            Some(caller.id),
            "REQUEST_CREATED",
            format!("Request {} status: {}", booking.id, status.as_str()),
            client_ip(&req),
        )
        .await,
    );

    let notified = if status == BookingStatus::Pending {
        notify_approvers(&state, &booking, &resource, &caller).await
    } else {
        notify(
            state.repo.as_ref(),
            caller.id,
            format!("Booking for {} has been AUTO-APPROVED.", resource.name),
        )
        .await
    };
    after_commit("notification", notified);
    info!(
        "Booking {} on {} by {} is {}",
        booking.id,
        resource.name,
        caller.email,
        status.as_str()
    );

    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Created().json(to_response(&booking, &lookup)))
}

pub async fn cancel_booking(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let (booking, resource) = load_visible(&state, &caller, path.into_inner()).await?;
    require(booking.user == caller.id || caller.role == Role::Admin)?;

    state.repo.delete_booking(booking.id).await?;
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "REQUEST_CANCELLED",
        format!("Cancelled ID: {} on {}", booking.id, resource.name),
        client_ip(&req),
    )
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn approve_booking(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
    payload: Option<web::Json<DecisionRequest>>,
) -> Result<HttpResponse, ApiError> {
    let (mut booking, resource) = load_visible(&state, &caller, path.into_inner()).await?;
    if !policy::can_approve(&caller, &booking, &resource) {
        debug!("{} may not approve booking {}", caller.email, booking.id);
        return Err(ApiError::forbidden("Authorization failed"));
    }
    if booking.status != BookingStatus::Pending {
        return Err(ApiError::bad_request("Already processed"));
    }

    booking.status = BookingStatus::Approved;
    booking.remarks = Some(
        payload
            .and_then(|p| p.into_inner().remarks)
            .unwrap_or_default(),
    );
    booking.updated_at = Utc::now();
    state.repo.save_booking(&booking).await?;

    after_commit(
        "notification",
        notify(
            state.repo.as_ref(),
            booking.user,
            format!("Access to {} has been GRANTED.", resource.name),
        )
        .await,
    );
    after_commit(
        "audit",
        record_audit(
            state.repo.as_ref(),
            Some(caller.id),
            "REQUEST_APPROVED",
            format!("Approved ID: {}", booking.id),
            client_ip(&req),
        )
        .await,
    );

    Ok(HttpResponse::Ok().json(DecisionResponse {
        status: "approved".to_string(),
    }))
}

/// A rejection may also revoke an approved booking, but not repeat itself.
pub async fn reject_booking(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
    payload: Option<web::Json<DecisionRequest>>,
) -> Result<HttpResponse, ApiError> {
    let (mut booking, resource) = load_visible(&state, &caller, path.into_inner()).await?;
    let reason = payload
        .and_then(|p| p.into_inner().remarks)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Justification required"))?;

    if !policy::can_reject(&caller, &booking, &resource) {
        debug!("{} may not reject booking {}", caller.email, booking.id);
        return Err(ApiError::forbidden("Auth failed"));
    }
    if booking.status == BookingStatus::Rejected {
        return Err(ApiError::bad_request("Already processed"));
    }

    booking.status = BookingStatus::Rejected;
    booking.remarks = Some(reason.clone());
    booking.updated_at = Utc::now();
    state.repo.save_booking(&booking).await?;

    after_commit(
        "notification",
        notify(
            state.repo.as_ref(),
            booking.user,
            format!("Access to {} DENIED: {}", resource.name, reason),
        )
        .await,
    );
    after_commit(
        "audit",
        record_audit(
            state.repo.as_ref(),
            Some(caller.id),
            "REQUEST_REJECTED",
            format!("Rejected ID: {}", booking.id),
            client_ip(&req),
        )
        .await,
    );

    Ok(HttpResponse::Ok().json(DecisionResponse {
        status: "rejected".to_string(),
    }))
}

pub async fn availability(
    state: web::Data<AppState>,
    _caller: Authenticated,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, ApiError> {
    let (Some(resource), Some(date)) = (query.resource, query.date.as_deref()) else {
        return Err(ApiError::bad_request("Resource and date are required"));
    };
    let date = parse_date(date).ok_or_else(|| ApiError::bad_request("Invalid date format provided."))?;
    let slots = state.repo.busy_slots(resource, date).await?;
    Ok(HttpResponse::Ok().json(slots))
}
