use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;

use super::{client_ip, notify, record_audit, require, Lookup, NOT_FOUND};
use crate::auth::{AppState, Authenticated};
use crate::error::ApiError;
use crate::models::{CreateMeetingRequest, MeetingResponse, MeetingSchedule};
use crate::policy::is_staff_or_above;
use crate::schedule::{duration_hours, parse_date, parse_time};
use crate::validation::FieldErrors;

fn to_response(meeting: &MeetingSchedule, lookup: &Lookup) -> MeetingResponse {
    MeetingResponse {
        id: meeting.id,
        title: meeting.title.clone(),
        description: meeting.description.clone(),
        organizer: meeting.organizer,
        organizer_name: lookup.user_name(meeting.organizer).unwrap_or_default(),
        participants: meeting.participants.clone(),
        participant_names: meeting
            .participants
            .iter()
            .filter_map(|id| lookup.user_name(*id))
            .collect(),
        date: meeting.date,
        start_time: meeting.start_time,
        end_time: meeting.end_time,
        location: meeting.location,
        location_name: meeting.location.and_then(|id| lookup.resource_name(id)),
        created_at: meeting.created_at,
    }
}

fn involves(meeting: &MeetingSchedule, user: i64) -> bool {
    meeting.organizer == user || meeting.participants.contains(&user)
}

pub async fn list_meetings(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<HttpResponse, ApiError> {
    let meetings = state.repo.meetings_for(caller.id).await?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    let body: Vec<MeetingResponse> = meetings.iter().map(|m| to_response(m, &lookup)).collect();
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_meeting(
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let meeting = state
        .repo
        .find_meeting(path.into_inner())
        .await?
        .filter(|m| involves(m, caller.id))
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Ok().json(to_response(&meeting, &lookup)))
}

pub async fn create_meeting(
    req: HttpRequest,
    state: web::Data<AppState>,
    Authenticated(caller): Authenticated,
    payload: web::Json<CreateMeetingRequest>,
) -> Result<HttpResponse, ApiError> {
    require(is_staff_or_above(caller.role))?;
    let payload = payload.into_inner();

    let mut errors = FieldErrors::default();
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        errors.push("title", "This field may not be blank.");
    }
    let date = parse_date(&payload.date);
    if date.is_none() {
        errors.push("date", "Date has wrong format. Use YYYY-MM-DD.");
    }
    let start = parse_time(&payload.start_time);
    if start.is_none() {
        errors.push("start_time", "Time has wrong format. Use hh:mm[:ss].");
    }
    let end = parse_time(&payload.end_time);
    if end.is_none() {
        errors.push("end_time", "Time has wrong format. Use hh:mm[:ss].");
    }
    if let (Some(start), Some(end)) = (start, end) {
        if duration_hours(start, end) <= 0.0 {
            errors.push("end_time", "End time must succeed start time.");
        }
    }

    let mut participants = Vec::with_capacity(payload.participants.len());
    for id in payload.participants {
        if participants.contains(&id) {
            continue;
        }
        if state.repo.find_user(id).await?.is_none() {
            errors.push("participants", format!("Invalid pk \"{id}\" - object does not exist."));
        }
        participants.push(id);
    }
    if let Some(location) = payload.location {
        if state.repo.find_resource(location).await?.is_none() {
            errors.push("location", format!("Invalid pk \"{location}\" - object does not exist."));
        }
    }

    let (Some(date), Some(start_time), Some(end_time), true) = (date, start, end, errors.is_empty()) else {
        return Err(ApiError::validation(&errors, "Invalid meeting"));
    };

    let meeting = state
        .repo
        .insert_meeting(MeetingSchedule {
            id: 0,
            title,
            description: payload.description,
            organizer: caller.id,
            participants,
            date,
            start_time,
            end_time,
            location: payload.location,
            created_at: Utc::now(),
        })
        .await?;

    let message = format!(
        "New Meeting Scheduled: {} on {} at {}",
        meeting.title,
        meeting.date,
        meeting.start_time.format("%H:%M")
    );
    for participant in meeting.participants.iter().filter(|id| **id != caller.id) {
        notify(state.repo.as_ref(), *participant, message.clone()).await?;
    }
    record_audit(
        state.repo.as_ref(),
        Some(caller.id),
        "MEETING_SCHEDULED",
        format!("Meeting '{}' with {} participants", meeting.title, meeting.participants.len()),
        client_ip(&req),
    )
    .await?;
    info!("{} scheduled meeting {}", caller.email, meeting.id);

    let lookup = Lookup::load(state.repo.as_ref()).await?;
    Ok(HttpResponse::Created().json(to_response(&meeting, &lookup)))
}
