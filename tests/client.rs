mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use campus_book::client::{ApiClient, ClientError, FileTokenStore, MemoryTokenStore, TokenStore};
use campus_book::models::{BookingStatus, CreateBookingRequest, SignupRequest};
use campus_book::schedule::{free_windows, parse_time};
use common::*;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 5, 20).unwrap()
}

fn request(resource: i64, start: &str, end: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        resource: Some(resource),
        booking_date: DAY.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        ..Default::default()
    }
}

#[actix_rt::test]
async fn booking_lifecycle_over_http() {
    let (base_url, server) = spawn_server(seeded_state().await);
    let student = ApiClient::new(base_url.clone(), Arc::new(MemoryTokenStore::new()));
    let incharge = ApiClient::new(base_url, Arc::new(MemoryTokenStore::new()));

    let auth = student.login(STUDENT.0, STUDENT.1).await.unwrap();
    assert_eq!(auth.user.name, "Gokul Student");
    incharge.login(INCHARGE.0, INCHARGE.1).await.unwrap();

    let resources = student.list_resources().await.unwrap();
    assert_eq!(resources.len(), 5);

    let created = student
        .create_booking(&request(PHYSICS_LAB, "09:00", "10:00"))
        .await
        .unwrap();
    assert_eq!(created.status, BookingStatus::Pending);

    let busy = student.availability(PHYSICS_LAB, day()).await.unwrap();
    let open = parse_time("08:00").unwrap();
    let close = parse_time("12:00").unwrap();
    assert_eq!(
        free_windows(&busy, open, close),
        vec![
            (open, parse_time("09:00").unwrap()),
            (parse_time("10:00").unwrap(), close)
        ]
    );

    match student.create_booking(&request(PHYSICS_LAB, "09:30", "10:00")).await {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 409),
        other => panic!("expected conflict, got {other:?}"),
    }

    match student.approve_booking(created.id, None).await {
        Err(ClientError::Forbidden(message)) => assert_eq!(message, "Authorization failed"),
        other => panic!("expected forbidden, got {other:?}"),
    }

    let decision = incharge.approve_booking(created.id, Some("Enjoy")).await.unwrap();
    assert_eq!(decision.status, "approved");
    let fetched = student.get_booking(created.id).await.unwrap();
    assert_eq!(fetched.status, BookingStatus::Approved);
    assert_eq!(fetched.remarks.as_deref(), Some("Enjoy"));

    let inbox = student.notifications().await.unwrap();
    assert!(inbox.iter().any(|n| n.message.contains("GRANTED")));
    student.mark_all_read().await.unwrap();
    assert!(student.notifications().await.unwrap().iter().all(|n| n.is_read));

    student.cancel_booking(created.id).await.unwrap();
    assert!(student.list_bookings().await.unwrap().is_empty());

    server.stop(false).await;
}

#[actix_rt::test]
async fn unauthorized_responses_clear_stored_tokens() {
    let (base_url, server) = spawn_server(seeded_state().await);
    let first_store = Arc::new(MemoryTokenStore::new());
    let first = ApiClient::new(base_url.clone(), first_store.clone());
    let second = ApiClient::new(base_url, Arc::new(MemoryTokenStore::new()));

    first.login(STAFF.0, STAFF.1).await.unwrap();
    second.login(STAFF.0, STAFF.1).await.unwrap();

    assert!(matches!(
        first.list_bookings().await,
        Err(ClientError::Unauthorized)
    ));
    assert!(first_store.load().unwrap().is_none());

    // the second session is untouched and can be refreshed
    second.refresh().await.unwrap();
    assert!(second.student_stats().await.is_ok());

    server.stop(false).await;
}

#[actix_rt::test]
async fn login_survives_in_a_token_file() {
    let (base_url, server) = spawn_server(seeded_state().await);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");

    ApiClient::new(base_url.clone(), Arc::new(FileTokenStore::new(&path)))
        .login(ADMIN.0, ADMIN.1)
        .await
        .unwrap();

    let later = ApiClient::new(base_url, Arc::new(FileTokenStore::new(&path)));
    let stats = later.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_resources, 5);
    let staff = later
        .users_by_role(campus_book::models::Role::Staff)
        .await
        .unwrap();
    assert_eq!(staff.len(), 1);
    assert!(!later.audit_logs().await.unwrap().is_empty());

    later.logout().await.unwrap();
    assert!(!path.exists());
    assert!(matches!(
        later.dashboard_stats().await,
        Err(ClientError::Unauthorized)
    ));

    server.stop(false).await;
}

#[actix_rt::test]
async fn signup_then_login() {
    let (base_url, server) = spawn_server(seeded_state().await);
    let client = ApiClient::new(base_url, Arc::new(MemoryTokenStore::new()));

    let user = client
        .signup(&SignupRequest {
            name: "Asha Menon".to_string(),
            email: "asha@edu.in".to_string(),
            phone: "9876543210".to_string(),
            password: "Password@1".to_string(),
            confirm_password: "Password@1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(user.email, "asha@edu.in");

    match client.login("asha@edu.in", "not-the-password").await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("Invalid email or password"), "{message}");
        }
        other => panic!("expected a rejected login, got {other:?}"),
    }
    client.login("asha@edu.in", "Password@1").await.unwrap();
    let stats = client.student_stats().await.unwrap();
    assert_eq!(stats.pending, 0);

    // a mistyped login for someone else leaves the current session alone
    let err = client.login(STUDENT.0, "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password (HTTP 401)");
    assert!(client.student_stats().await.is_ok());

    server.stop(false).await;
}
