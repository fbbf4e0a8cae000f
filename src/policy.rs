//! Booking rules: who may book what for how long, who approves it, and who
//! gets to see it.
//!
//! Everything here is pure so the HTTP layer only loads records and applies
//! these decisions.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::models::{Booking, BookingStatus, BookingType, Resource, ResourceType, Role, User};
use crate::schedule::duration_hours;

pub const STUDENT_MAX_HOURS: f64 = 1.0;
pub const STAFF_MAX_HOURS: f64 = 4.0;
pub const MAX_FAILED_LOGINS: u32 = 3;
pub const LOCKOUT_MINUTES: i64 = 3;

pub fn is_staff_or_above(role: Role) -> bool {
    matches!(role, Role::Staff | Role::LabIncharge | Role::Admin)
}

pub fn can_manage_resources(role: Role) -> bool {
    matches!(role, Role::Admin | Role::LabIncharge)
}

/// Special bookings are institutional events and skip the per-role caps.
pub fn check_duration(
    role: Role,
    kind: BookingType,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<(), &'static str> {
    let hours = duration_hours(start, end);
    if hours <= 0.0 {
        return Err("Invalid temporal range: End time must succeed start time.");
    }
    if kind != BookingType::Special {
        if role == Role::Student && hours > STUDENT_MAX_HOURS {
            return Err("Students are restricted to 60-minute sessions per booking.");
        }
        if role == Role::Staff && hours > STAFF_MAX_HOURS {
            return Err("Staff sessions are limited to a maximum of 4 hours.");
        }
    }
    Ok(())
}

pub fn priority_for(role: Role, kind: BookingType) -> i32 {
    if kind == BookingType::Special {
        2
    } else if matches!(role, Role::Staff | Role::Admin) {
        1
    } else {
        0
    }
}

/// Admin bookings and normal staff bookings skip the approval queue.
pub fn initial_status(role: Role, kind: BookingType) -> BookingStatus {
    match (role, kind) {
        (Role::Admin, _) => BookingStatus::Approved,
        (Role::Staff, BookingType::Normal) => BookingStatus::Approved,
        _ => BookingStatus::Pending,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverRoute {
    LabInCharge(i64),
    AssignedStaff(i64),
    Admins,
}

/// Who is told about a new pending request.
pub fn approver_route(kind: BookingType, resource: &Resource) -> ApproverRoute {
    match (resource.kind, resource.lab_in_charge, kind, resource.assigned_staff) {
        (ResourceType::Lab, Some(incharge), _, _) => ApproverRoute::LabInCharge(incharge),
        (_, _, BookingType::Meeting, Some(staff)) => ApproverRoute::AssignedStaff(staff),
        _ => ApproverRoute::Admins,
    }
}

fn manages_lab(actor: &User, resource: &Resource) -> bool {
    resource.kind == ResourceType::Lab && resource.lab_in_charge == Some(actor.id)
}

fn meeting_directed_at(actor: &User, booking: &Booking, resource: &Resource) -> bool {
    booking.booking_type == BookingType::Meeting && resource.assigned_staff == Some(actor.id)
}

pub fn can_approve(actor: &User, booking: &Booking, resource: &Resource) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::LabIncharge => manages_lab(actor, resource),
        Role::Staff => meeting_directed_at(actor, booking, resource) || booking.user == actor.id,
        Role::Student => false,
    }
}

/// Unlike approval, staff cannot reject their own requests.
pub fn can_reject(actor: &User, booking: &Booking, resource: &Resource) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::LabIncharge => manages_lab(actor, resource),
        Role::Staff => meeting_directed_at(actor, booking, resource),
        Role::Student => false,
    }
}

/// The slice of bookings a user is allowed to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingScope {
    All,
    Owner(i64),
    /// Own bookings plus anything on the listed resources.
    OwnerOrResources { user: i64, resources: Vec<i64> },
    /// Own bookings plus meeting requests on the listed resources.
    OwnerOrMeetings { user: i64, resources: Vec<i64> },
}

impl BookingScope {
    pub fn admits(&self, booking: &Booking) -> bool {
        match self {
            BookingScope::All => true,
            BookingScope::Owner(user) => booking.user == *user,
            BookingScope::OwnerOrResources { user, resources } => {
                booking.user == *user || resources.contains(&booking.resource)
            }
            BookingScope::OwnerOrMeetings { user, resources } => {
                booking.user == *user
                    || (booking.booking_type == BookingType::Meeting
                        && resources.contains(&booking.resource))
            }
        }
    }
}

/// `managed` are the labs a lab in-charge runs, `assigned` the resources
/// assigned to a staff member. Each is ignored for other roles.
pub fn booking_scope(user: &User, managed: Vec<i64>, assigned: Vec<i64>) -> BookingScope {
    match user.role {
        Role::Admin => BookingScope::All,
        Role::LabIncharge => BookingScope::OwnerOrResources {
            user: user.id,
            resources: managed,
        },
        Role::Staff => BookingScope::OwnerOrMeetings {
            user: user.id,
            resources: assigned,
        },
        Role::Student => BookingScope::Owner(user.id),
    }
}

pub fn register_failed_login(user: &mut User, now: DateTime<Utc>) {
    user.failed_login_attempts += 1;
    user.last_failed_login_at = Some(now);
    if user.failed_login_attempts >= MAX_FAILED_LOGINS {
        user.account_locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
    }
}

/// Starts a fresh session, which invalidates tokens from earlier logins.
pub fn register_successful_login(user: &mut User, session: String) {
    user.failed_login_attempts = 0;
    user.last_failed_login_at = None;
    user.account_locked_until = None;
    user.current_session = Some(session);
}
