//! Runs against a live server when `CAMPUS_TEST_MONGODB_URI` is set, and is a
//! no-op otherwise.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use futures::future::join_all;

use campus_book::db::{MongoDB, Repository};
use campus_book::error::StoreError;
use campus_book::models::{Booking, BookingStatus, BookingType, Role, User, UserStatus};

struct Scratch {
    store: Arc<MongoDB>,
    uri: String,
    name: String,
}

impl Scratch {
    async fn open() -> Option<Self> {
        let Ok(uri) = std::env::var("CAMPUS_TEST_MONGODB_URI") else {
            eprintln!("CAMPUS_TEST_MONGODB_URI not set, skipping");
            return None;
        };
        let name = format!("campus_book_test_{}", uuid::Uuid::new_v4().simple());
        let store = MongoDB::new(&uri, &name).await.expect("connect to mongodb");
        Some(Self {
            store: Arc::new(store),
            uri,
            name,
        })
    }

    async fn remove(self) {
        let client = mongodb::Client::with_uri_str(&self.uri).await.expect("connect");
        client.database(&self.name).drop(None).await.expect("drop scratch database");
    }
}

fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn booking(user: i64, start: NaiveTime, end: NaiveTime) -> Booking {
    let now = Utc::now();
    Booking {
        id: 0,
        user,
        resource: 1,
        booking_date: NaiveDate::from_ymd_opt(2031, 5, 20).unwrap(),
        start_time: start,
        end_time: end,
        booking_type: BookingType::Normal,
        justification: None,
        remarks: None,
        priority_level: 0,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

fn user(email: &str) -> User {
    User {
        id: 0,
        username: "Asha".to_string(),
        email: email.to_string(),
        password: "hash".to_string(),
        phone: None,
        role: Role::Student,
        status: UserStatus::Active,
        department: None,
        roll_number: None,
        employee_id: None,
        designation: None,
        failed_login_attempts: 0,
        last_failed_login_at: None,
        account_locked_until: None,
        current_session: None,
        created_at: Utc::now(),
    }
}

#[actix_rt::test]
async fn concurrent_requests_for_one_slot_admit_a_single_booking() {
    let Some(scratch) = Scratch::open().await else { return };

    let attempts = (0..8_i64).map(|i| {
        let store = scratch.store.clone();
        async move { store.insert_booking(booking(i + 1, t(9, 0), t(10, 0)), true).await }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, StoreError::Conflict(_))));

    // touching slots on the same day still go through once the lock is free
    scratch
        .store
        .insert_booking(booking(9, t(10, 0), t(11, 0)), true)
        .await
        .unwrap();

    scratch.remove().await;
}

#[actix_rt::test]
async fn concurrent_signups_cannot_share_an_email() {
    let Some(scratch) = Scratch::open().await else { return };

    let attempts = (0..4).map(|_| {
        let store = scratch.store.clone();
        async move { store.insert_user(user("Asha@Edu.in")).await }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, StoreError::Conflict(m) if m == "user with this email already exists."));
    }
    assert_eq!(scratch.store.count_users().await.unwrap(), 1);

    scratch.remove().await;
}
