use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    #[default]
    Normal,
    Special,
    Meeting,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Normal => "NORMAL",
            BookingType::Special => "SPECIAL",
            BookingType::Meeting => "MEETING",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    /// Statuses that hold a slot on the resource.
    pub fn occupying() -> [BookingStatus; 2] {
        [BookingStatus::Approved, BookingStatus::Pending]
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: i64,
    pub resource: i64,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub booking_type: BookingType,
    pub justification: Option<String>,
    pub remarks: Option<String>,
    pub priority_level: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dates and times arrive as strings so malformed values get a readable error.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CreateBookingRequest {
    pub resource: Option<i64>,
    pub staff_id: Option<String>,
    #[serde(default)]
    pub booking_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub booking_type: Option<BookingType>,
    pub justification: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BookingResponse {
    pub id: i64,
    pub user: i64,
    pub user_name: String,
    pub user_role: String,
    pub user_dept: Option<String>,
    pub user_id_ref: Option<String>,
    pub resource: i64,
    pub resource_name: String,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub booking_type: BookingType,
    pub justification: Option<String>,
    pub remarks: Option<String>,
    pub priority_level: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DecisionRequest {
    pub remarks: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DecisionResponse {
    pub status: String,
}

#[derive(Deserialize, Debug)]
pub struct AvailabilityQuery {
    pub resource: Option<i64>,
    pub date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusySlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<&Booking> for BusySlot {
    fn from(booking: &Booking) -> Self {
        Self {
            start_time: booking.start_time,
            end_time: booking.end_time,
        }
    }
}
