//! Persistence port and its adapters.

pub mod memory;
pub mod mongodb;
pub mod seed;

pub use self::memory::MemoryStore;
pub use self::mongodb::MongoDB;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{
    AuditLog, Booking, BookingStatus, BusySlot, MeetingSchedule, Notification, Resource,
    ResourceType, Role, User,
};
use crate::policy::BookingScope;

/// Which bookings a query returns. Empty `statuses` means any status.
#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub scope: BookingScope,
    pub statuses: Vec<BookingStatus>,
    pub resource: Option<i64>,
    pub date: Option<NaiveDate>,
    pub on_or_after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn scoped(scope: BookingScope) -> Self {
        Self {
            scope,
            statuses: Vec::new(),
            resource: None,
            date: None,
            on_or_after: None,
            before: None,
        }
    }

    pub fn all() -> Self {
        Self::scoped(BookingScope::All)
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Slots held on one resource for one day.
    pub fn occupying(resource: i64, date: NaiveDate) -> Self {
        Self {
            statuses: BookingStatus::occupying().to_vec(),
            resource: Some(resource),
            date: Some(date),
            ..Self::all()
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.scope.admits(booking)
            && (self.statuses.is_empty() || self.statuses.contains(&booking.status))
            && self.resource.map_or(true, |r| booking.resource == r)
            && self.date.map_or(true, |d| booking.booking_date == d)
            && self.on_or_after.map_or(true, |d| booking.booking_date >= d)
            && self.before.map_or(true, |d| booking.booking_date < d)
    }
}

/// Storage used by the HTTP layer. `insert_*` methods ignore the incoming id
/// and return the record with the id the store allocated.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_staff_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn count_users(&self) -> Result<u64, StoreError>;

    async fn find_resource(&self, id: i64) -> Result<Option<Resource>, StoreError>;
    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;
    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError>;
    async fn save_resource(&self, resource: &Resource) -> Result<(), StoreError>;
    /// Removes the resource and its bookings, and clears it as a meeting location.
    async fn delete_resource(&self, id: i64) -> Result<bool, StoreError>;

    async fn find_booking(&self, id: i64) -> Result<Option<Booking>, StoreError>;
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;
    async fn count_bookings(&self, filter: &BookingFilter) -> Result<u64, StoreError>;
    /// With `reject_overlap`, fails with [`StoreError::Conflict`] if the slot
    /// collides with an approved or pending booking on the same resource and day.
    async fn insert_booking(&self, booking: Booking, reject_overlap: bool) -> Result<Booking, StoreError>;
    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError>;
    async fn delete_booking(&self, id: i64) -> Result<bool, StoreError>;

    async fn find_meeting(&self, id: i64) -> Result<Option<MeetingSchedule>, StoreError>;
    async fn meetings_for(&self, user: i64) -> Result<Vec<MeetingSchedule>, StoreError>;
    async fn insert_meeting(&self, meeting: MeetingSchedule) -> Result<MeetingSchedule, StoreError>;

    async fn insert_audit(&self, entry: AuditLog) -> Result<AuditLog, StoreError>;
    async fn list_audit(&self) -> Result<Vec<AuditLog>, StoreError>;
    async fn find_audit(&self, id: i64) -> Result<Option<AuditLog>, StoreError>;

    async fn insert_notification(&self, notification: Notification) -> Result<Notification, StoreError>;
    async fn notifications_for(&self, user: i64) -> Result<Vec<Notification>, StoreError>;
    async fn find_notification(&self, id: i64) -> Result<Option<Notification>, StoreError>;
    async fn save_notification(&self, notification: &Notification) -> Result<(), StoreError>;
    async fn delete_notification(&self, id: i64) -> Result<bool, StoreError>;
    async fn mark_all_read(&self, user: i64) -> Result<u64, StoreError>;

    async fn count_resources(&self) -> Result<u64, StoreError> {
        Ok(self.list_resources().await?.len() as u64)
    }

    /// Labs whose in-charge is `user`.
    async fn managed_labs(&self, user: i64) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .list_resources()
            .await?
            .into_iter()
            .filter(|r| r.kind == ResourceType::Lab && r.lab_in_charge == Some(user))
            .map(|r| r.id)
            .collect())
    }

    async fn assigned_resources(&self, staff: i64) -> Result<Vec<Resource>, StoreError> {
        Ok(self
            .list_resources()
            .await?
            .into_iter()
            .filter(|r| r.assigned_staff == Some(staff))
            .collect())
    }

    async fn first_of_type(&self, kind: ResourceType) -> Result<Option<Resource>, StoreError> {
        Ok(self.list_resources().await?.into_iter().find(|r| r.kind == kind))
    }

    async fn busy_slots(&self, resource: i64, date: NaiveDate) -> Result<Vec<BusySlot>, StoreError> {
        let mut slots: Vec<BusySlot> = self
            .list_bookings(&BookingFilter::occupying(resource, date))
            .await?
            .iter()
            .map(BusySlot::from)
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == role)
            .collect())
    }
}
