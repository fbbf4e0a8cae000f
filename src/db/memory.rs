use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BookingFilter, Repository};
use crate::error::StoreError;
use crate::models::{AuditLog, Booking, MeetingSchedule, Notification, Resource, Role, User};
use crate::schedule::overlaps;

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    users: BTreeMap<i64, User>,
    resources: BTreeMap<i64, Resource>,
    bookings: BTreeMap<i64, Booking>,
    meetings: BTreeMap<i64, MeetingSchedule>,
    audit: BTreeMap<i64, AuditLog>,
    notifications: BTreeMap<i64, Notification>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// In-process store. Every operation runs under a single lock, so the
/// conflict check in `insert_booking` is atomic with the insert.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_staff_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.role == Role::Staff && u.employee_id.as_deref() == Some(employee_id))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables().users.values().cloned().collect())
    }

    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("user with this email already exists.".into()));
        }
        user.id = tables.next_id("users");
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.tables().users.len() as u64)
    }

    async fn find_resource(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        Ok(self.tables().resources.get(&id).cloned())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        Ok(self.tables().resources.values().cloned().collect())
    }

    async fn insert_resource(&self, mut resource: Resource) -> Result<Resource, StoreError> {
        let mut tables = self.tables();
        resource.id = tables.next_id("resources");
        tables.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn save_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        self.tables().resources.insert(resource.id, resource.clone());
        Ok(())
    }

    async fn delete_resource(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        if tables.resources.remove(&id).is_none() {
            return Ok(false);
        }
        tables.bookings.retain(|_, b| b.resource != id);
        for meeting in tables.meetings.values_mut() {
            if meeting.location == Some(id) {
                meeting.location = None;
            }
        }
        Ok(true)
    }

    async fn find_booking(&self, id: i64) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables().bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .tables()
            .bookings
            .values()
            .rev()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn count_bookings(&self, filter: &BookingFilter) -> Result<u64, StoreError> {
        Ok(self
            .tables()
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .count() as u64)
    }

    async fn insert_booking(&self, mut booking: Booking, reject_overlap: bool) -> Result<Booking, StoreError> {
        let mut tables = self.tables();
        if reject_overlap {
            let occupying = BookingFilter::occupying(booking.resource, booking.booking_date);
            let clash = tables.bookings.values().any(|b| {
                occupying.matches(b)
                    && overlaps(booking.start_time, booking.end_time, b.start_time, b.end_time)
            });
            if clash {
                return Err(StoreError::Conflict(
                    "Requested slot overlaps an existing booking.".into(),
                ));
            }
        }
        booking.id = tables.next_id("bookings");
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.tables().bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn delete_booking(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables().bookings.remove(&id).is_some())
    }

    async fn find_meeting(&self, id: i64) -> Result<Option<MeetingSchedule>, StoreError> {
        Ok(self.tables().meetings.get(&id).cloned())
    }

    async fn meetings_for(&self, user: i64) -> Result<Vec<MeetingSchedule>, StoreError> {
        Ok(self
            .tables()
            .meetings
            .values()
            .filter(|m| m.organizer == user || m.participants.contains(&user))
            .cloned()
            .collect())
    }

    async fn insert_meeting(&self, mut meeting: MeetingSchedule) -> Result<MeetingSchedule, StoreError> {
        let mut tables = self.tables();
        meeting.id = tables.next_id("meetings");
        tables.meetings.insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    async fn insert_audit(&self, mut entry: AuditLog) -> Result<AuditLog, StoreError> {
        let mut tables = self.tables();
        entry.id = tables.next_id("audit_logs");
        tables.audit.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn list_audit(&self) -> Result<Vec<AuditLog>, StoreError> {
        Ok(self.tables().audit.values().rev().cloned().collect())
    }

    async fn find_audit(&self, id: i64) -> Result<Option<AuditLog>, StoreError> {
        Ok(self.tables().audit.get(&id).cloned())
    }

    async fn insert_notification(&self, mut notification: Notification) -> Result<Notification, StoreError> {
        let mut tables = self.tables();
        notification.id = tables.next_id("notifications");
        tables.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn notifications_for(&self, user: i64) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .tables()
            .notifications
            .values()
            .rev()
            .filter(|n| n.user == user)
            .cloned()
            .collect())
    }

    async fn find_notification(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        Ok(self.tables().notifications.get(&id).cloned())
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.tables()
            .notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn delete_notification(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.tables().notifications.remove(&id).is_some())
    }

    async fn mark_all_read(&self, user: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let mut updated = 0;
        for n in tables.notifications.values_mut().filter(|n| n.user == user && !n.is_read) {
            n.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, BookingType, ResourceStatus, ResourceType};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
    }

    fn booking(start: u32, end: u32, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: 0,
            user: 1,
            resource: 1,
            booking_date: day(),
            start_time: t(start),
            end_time: t(end),
            booking_type: BookingType::Normal,
            justification: None,
            remarks: None,
            priority_level: 0,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_rt::test]
    async fn overlapping_insert_is_refused() {
        let store = MemoryStore::new();
        let first = store
            .insert_booking(booking(9, 10, BookingStatus::Pending), true)
            .await
            .unwrap();
        assert_eq!(first.id, 1);

        let clash = store
            .insert_booking(booking(9, 11, BookingStatus::Pending), true)
            .await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));

        let adjacent = store
            .insert_booking(booking(10, 11, BookingStatus::Pending), true)
            .await
            .unwrap();
        assert_eq!(adjacent.id, 2);
    }

    #[actix_rt::test]
    async fn rejected_bookings_free_their_slot() {
        let store = MemoryStore::new();
        store
            .insert_booking(booking(9, 10, BookingStatus::Rejected), true)
            .await
            .unwrap();
        assert!(store
            .insert_booking(booking(9, 10, BookingStatus::Pending), true)
            .await
            .is_ok());
        assert_eq!(store.busy_slots(1, day()).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn deleting_a_resource_cascades_to_bookings() {
        let store = MemoryStore::new();
        let resource = store
            .insert_resource(Resource {
                id: 0,
                name: "Seminar Hall B".into(),
                kind: ResourceType::EventHall,
                capacity: 150,
                status: ResourceStatus::Active,
                lab_in_charge: None,
                assigned_staff: None,
            })
            .await
            .unwrap();
        store
            .insert_booking(booking(9, 10, BookingStatus::Approved), false)
            .await
            .unwrap();

        assert!(store.delete_resource(resource.id).await.unwrap());
        assert_eq!(store.count_bookings(&BookingFilter::all()).await.unwrap(), 0);
        assert!(!store.delete_resource(resource.id).await.unwrap());
    }
}
