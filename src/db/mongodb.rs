use std::time::Duration;

use actix_web::rt::time::sleep;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use log::{debug, info, warn};
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client, Collection, Cursor, IndexModel,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{BookingFilter, Repository};
use crate::error::StoreError;
use crate::models::{AuditLog, Booking, BookingType, MeetingSchedule, Notification, Resource, Role, User};
use crate::policy::BookingScope;
use crate::schedule::overlaps;

const DUPLICATE_KEY: i32 = 11000;

/// How long a slot lock stays valid if its holder never releases it.
const SLOT_LEASE_MS: i64 = 10_000;
const SLOT_LOCK_ATTEMPTS: u32 = 50;
const SLOT_LOCK_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db_name: String,
}

impl MongoDB {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let client_options = mongodb::options::ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let store = MongoDB {
            client,
            db_name: db_name.to_string(),
        };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users().create_index(unique_email, None).await?;
        Ok(())
    }

    fn collection<T>(&self, name: &str) -> Collection<T> {
        self.client.database(&self.db_name).collection(name)
    }

    fn users(&self) -> Collection<User> {
        self.collection("users")
    }

    fn resources(&self) -> Collection<Resource> {
        self.collection("resources")
    }

    fn bookings(&self) -> Collection<Booking> {
        self.collection("bookings")
    }

    fn meetings(&self) -> Collection<MeetingSchedule> {
        self.collection("meetings")
    }

    fn audit_logs(&self) -> Collection<AuditLog> {
        self.collection("audit_logs")
    }

    fn notifications(&self) -> Collection<Notification> {
        self.collection("notifications")
    }

    /// Allocates the next integer id for `sequence` from the `counters` collection.
    async fn next_id(&self, sequence: &str) -> Result<i64, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = self
            .collection::<Document>("counters")
            .find_one_and_update(doc! { "_id": sequence }, doc! { "$inc": { "seq": 1_i64 } }, options)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("counter {sequence} missing after upsert")))?;
        counter
            .get_i64("seq")
            .map_err(|e| StoreError::Corrupt(format!("counter {sequence}: {e}")))
    }

    /// Takes the lock on one resource-day, waiting while another writer
    /// holds a live lease on it. Returns the holder token for [`Self::unlock_slot`].
    async fn lock_slot(&self, key: &str) -> Result<String, StoreError> {
        let holder = Uuid::new_v4().to_string();
        for _ in 0..SLOT_LOCK_ATTEMPTS {
            let now = Utc::now().timestamp_millis();
            let options = FindOneAndUpdateOptions::builder().upsert(true).build();
            let claim = self
                .collection::<Document>("slot_locks")
                .find_one_and_update(claimable_slot(key, now), claim_slot(&holder, now), options)
                .await;
            match claim {
                Ok(_) => return Ok(holder),
                // the upsert collided with a live lock held by someone else
                Err(e) if is_duplicate_key(&e) => sleep(SLOT_LOCK_BACKOFF).await,
                Err(e) => return Err(e.into()),
            }
        }
        warn!("Gave up waiting for slot lock {}", key);
        Err(StoreError::Conflict(
            "The requested slot is being booked by someone else, please retry.".into(),
        ))
    }

    async fn unlock_slot(&self, key: &str, holder: &str) {
        let released = self
            .collection::<Document>("slot_locks")
            .delete_one(doc! { "_id": key, "holder": holder }, None)
            .await;
        if let Err(e) = released {
            warn!("Failed to release slot lock {}: {}", key, e);
        }
    }

    async fn insert_unless_overlapping(&self, mut booking: Booking) -> Result<Booking, StoreError> {
        let occupying = BookingFilter::occupying(booking.resource, booking.booking_date);
        let existing = self.list_bookings(&occupying).await?;
        if existing
            .iter()
            .any(|b| overlaps(booking.start_time, booking.end_time, b.start_time, b.end_time))
        {
            warn!(
                "Rejected overlapping booking on resource {} for {}",
                booking.resource, booking.booking_date
            );
            return Err(StoreError::Conflict(
                "Requested slot overlaps an existing booking.".into(),
            ));
        }
        booking.id = self.next_id("bookings").await?;
        self.bookings().insert_one(&booking, None).await?;
        Ok(booking)
    }

    async fn find_many<T>(&self, collection: Collection<T>, filter: Document, newest_first: bool) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let order = if newest_first { -1 } else { 1 };
        let options = FindOptions::builder().sort(doc! { "_id": order }).build();
        let cursor = collection.find(filter, options).await?;
        drain(cursor).await
    }
}

async fn drain<T>(mut cursor: Cursor<T>) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        items.push(result?);
    }
    Ok(items)
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn email_taken(error: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&error) {
        StoreError::Conflict("user with this email already exists.".into())
    } else {
        error.into()
    }
}

/// Bookings on the same resource and day serialise on this key.
fn slot_key(resource: i64, date: NaiveDate) -> String {
    format!("{resource}:{date}")
}

/// Matches the lock document only when its lease has run out. A missing
/// document also fails to match, so the upsert inserts a fresh lock; a live
/// one makes the upsert collide on `_id`.
fn claimable_slot(key: &str, now_ms: i64) -> Document {
    doc! { "_id": key, "expires_at": { "$lt": now_ms } }
}

fn claim_slot(holder: &str, now_ms: i64) -> Document {
    doc! { "$set": { "holder": holder, "expires_at": now_ms + SLOT_LEASE_MS } }
}

fn scope_filter(scope: &BookingScope) -> Document {
    match scope {
        BookingScope::All => doc! {},
        BookingScope::Owner(user) => doc! { "user": *user },
        BookingScope::OwnerOrResources { user, resources } => doc! {
            "$or": [ { "user": *user }, { "resource": { "$in": resources.clone() } } ]
        },
        BookingScope::OwnerOrMeetings { user, resources } => doc! {
            "$or": [
                { "user": *user },
                { "booking_type": BookingType::Meeting.as_str(), "resource": { "$in": resources.clone() } },
            ]
        },
    }
}

fn booking_filter(filter: &BookingFilter) -> Document {
    let mut query = scope_filter(&filter.scope);
    if !filter.statuses.is_empty() {
        let statuses: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
        query.insert("status", doc! { "$in": statuses });
    }
    if let Some(resource) = filter.resource {
        query.insert("resource", resource);
    }
    // Dates are stored as ISO strings, which order the same way as the dates.
    let mut date_range = Document::new();
    if let Some(date) = filter.date {
        query.insert("booking_date", date.to_string());
    }
    if let Some(from) = filter.on_or_after {
        date_range.insert("$gte", from.to_string());
    }
    if let Some(before) = filter.before {
        date_range.insert("$lt", before.to_string());
    }
    if !date_range.is_empty() {
        query.insert("booking_date", date_range);
    }
    query
}

#[async_trait]
impl Repository for MongoDB {
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "email": email.to_lowercase() }, None)
            .await?)
    }

    async fn find_staff_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "employee_id": employee_id, "role": Role::Staff.as_str() }, None)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.find_many(self.users(), doc! {}, false).await
    }

    async fn insert_user(&self, mut user: User) -> Result<User, StoreError> {
        user.email = user.email.to_lowercase();
        user.id = self.next_id("users").await?;
        self.users().insert_one(&user, None).await.map_err(email_taken)?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.users()
            .replace_one(doc! { "_id": user.id }, user, None)
            .await
            .map_err(email_taken)?;
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.users().count_documents(None, None).await?)
    }

    async fn find_resource(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        Ok(self.resources().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        self.find_many(self.resources(), doc! {}, false).await
    }

    async fn insert_resource(&self, mut resource: Resource) -> Result<Resource, StoreError> {
        resource.id = self.next_id("resources").await?;
        self.resources().insert_one(&resource, None).await?;
        Ok(resource)
    }

    async fn save_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        self.resources()
            .replace_one(doc! { "_id": resource.id }, resource, None)
            .await?;
        Ok(())
    }

    async fn delete_resource(&self, id: i64) -> Result<bool, StoreError> {
        let result = self.resources().delete_one(doc! { "_id": id }, None).await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }
        let removed = self.bookings().delete_many(doc! { "resource": id }, None).await?;
        self.meetings()
            .update_many(doc! { "location": id }, doc! { "$set": { "location": null } }, None)
            .await?;
        info!("Deleted resource {} and {} of its bookings", id, removed.deleted_count);
        Ok(true)
    }

    async fn find_booking(&self, id: i64) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        self.find_many(self.bookings(), booking_filter(filter), true).await
    }

    async fn count_bookings(&self, filter: &BookingFilter) -> Result<u64, StoreError> {
        Ok(self
            .bookings()
            .count_documents(booking_filter(filter), None)
            .await?)
    }

    async fn insert_booking(&self, mut booking: Booking, reject_overlap: bool) -> Result<Booking, StoreError> {
        if !reject_overlap {
            booking.id = self.next_id("bookings").await?;
            self.bookings().insert_one(&booking, None).await?;
            return Ok(booking);
        }
        let key = slot_key(booking.resource, booking.booking_date);
        let holder = self.lock_slot(&key).await?;
        debug!("Holding slot lock {}", key);
        let outcome = self.insert_unless_overlapping(booking).await;
        self.unlock_slot(&key, &holder).await;
        outcome
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.bookings()
            .replace_one(doc! { "_id": booking.id }, booking, None)
            .await?;
        Ok(())
    }

    async fn delete_booking(&self, id: i64) -> Result<bool, StoreError> {
        let result = self.bookings().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_meeting(&self, id: i64) -> Result<Option<MeetingSchedule>, StoreError> {
        Ok(self.meetings().find_one(doc! { "_id": id }, None).await?)
    }

    async fn meetings_for(&self, user: i64) -> Result<Vec<MeetingSchedule>, StoreError> {
        let filter = doc! { "$or": [ { "organizer": user }, { "participants": user } ] };
        self.find_many(self.meetings(), filter, false).await
    }

    async fn insert_meeting(&self, mut meeting: MeetingSchedule) -> Result<MeetingSchedule, StoreError> {
        meeting.id = self.next_id("meetings").await?;
        self.meetings().insert_one(&meeting, None).await?;
        Ok(meeting)
    }

    async fn insert_audit(&self, mut entry: AuditLog) -> Result<AuditLog, StoreError> {
        entry.id = self.next_id("audit_logs").await?;
        self.audit_logs().insert_one(&entry, None).await?;
        Ok(entry)
    }

    async fn list_audit(&self) -> Result<Vec<AuditLog>, StoreError> {
        self.find_many(self.audit_logs(), doc! {}, true).await
    }

    async fn find_audit(&self, id: i64) -> Result<Option<AuditLog>, StoreError> {
        Ok(self.audit_logs().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_notification(&self, mut notification: Notification) -> Result<Notification, StoreError> {
        notification.id = self.next_id("notifications").await?;
        self.notifications().insert_one(&notification, None).await?;
        Ok(notification)
    }

    async fn notifications_for(&self, user: i64) -> Result<Vec<Notification>, StoreError> {
        self.find_many(self.notifications(), doc! { "user": user }, true)
            .await
    }

    async fn find_notification(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications().find_one(doc! { "_id": id }, None).await?)
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.notifications()
            .replace_one(doc! { "_id": notification.id }, notification, None)
            .await?;
        Ok(())
    }

    async fn delete_notification(&self, id: i64) -> Result<bool, StoreError> {
        let result = self.notifications().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn mark_all_read(&self, user: i64) -> Result<u64, StoreError> {
        let result = self
            .notifications()
            .update_many(
                doc! { "user": user, "is_read": false },
                doc! { "$set": { "is_read": true } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn count_resources(&self) -> Result<u64, StoreError> {
        Ok(self.resources().count_documents(None, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;

    #[test]
    fn staff_scope_only_admits_meetings_on_assigned_resources() {
        let filter = scope_filter(&BookingScope::OwnerOrMeetings {
            user: 2,
            resources: vec![4],
        });
        assert_eq!(
            filter,
            doc! { "$or": [ { "user": 2_i64 }, { "booking_type": "MEETING", "resource": { "$in": [4_i64] } } ] }
        );
    }

    #[test]
    fn occupying_filter_pins_resource_day_and_statuses() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let filter = booking_filter(&BookingFilter::occupying(7, date));
        assert_eq!(
            filter,
            doc! {
                "status": { "$in": ["APPROVED", "PENDING"] },
                "resource": 7_i64,
                "booking_date": "2025-04-01",
            }
        );
    }

    #[test]
    fn slot_lock_is_claimable_only_once_its_lease_expires() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let key = slot_key(7, date);
        assert_eq!(key, "7:2025-04-01");
        assert_eq!(
            claimable_slot(&key, 1_000),
            doc! { "_id": "7:2025-04-01", "expires_at": { "$lt": 1_000_i64 } }
        );
        assert_eq!(
            claim_slot("holder-a", 1_000),
            doc! { "$set": { "holder": "holder-a", "expires_at": 1_000_i64 + SLOT_LEASE_MS } }
        );
    }

    #[test]
    fn days_and_resources_lock_independently() {
        let day = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        assert_ne!(slot_key(7, day), slot_key(7, next));
        assert_ne!(slot_key(7, day), slot_key(8, day));
    }

    #[test]
    fn date_bounds_become_a_range() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let mut filter = BookingFilter::scoped(BookingScope::Owner(3)).with_status(BookingStatus::Approved);
        filter.on_or_after = Some(today);
        assert_eq!(
            booking_filter(&filter),
            doc! {
                "user": 3_i64,
                "status": { "$in": ["APPROVED"] },
                "booking_date": { "$gte": "2025-04-01" },
            }
        );
    }
}
