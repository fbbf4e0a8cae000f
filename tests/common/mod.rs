#![allow(dead_code, unused_macros)]

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use async_trait::async_trait;

use campus_book::auth::{AppState, TokenService};
use campus_book::db::{seed::seed, BookingFilter, MemoryStore, Repository};
use campus_book::error::StoreError;
use campus_book::models::{AuditLog, Booking, MeetingSchedule, Notification, Resource, User};
use campus_book::routes;

pub const ADMIN: (&str, &str) = ("hod@campus.edu", "Admin@123");
pub const STAFF: (&str, &str) = ("prof.radha@campus.edu", "Staff@123");
pub const INCHARGE: (&str, &str) = ("incharge.kumar@campus.edu", "Kumar@123");
pub const STUDENT: (&str, &str) = ("gokul@edu.in", "Gokul@123");

pub const PHYSICS_LAB: i64 = 1;
pub const SEMINAR_HALL: i64 = 3;
pub const CONFERENCE_ROOM: i64 = 4;
pub const CLASSROOM: i64 = 5;

pub const STAFF_ID: i64 = 2;
pub const STUDENT_ID: i64 = 4;

pub const DAY: &str = "2031-05-20";

/// Seeded in-memory state with a cheap bcrypt cost.
pub async fn seeded_state() -> web::Data<AppState> {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref(), false, 4).await.expect("seed store");
    let tokens = TokenService::new("integration-secret", 24, 168);
    web::Data::new(AppState::new(store, tokens).with_bcrypt_cost(4))
}

/// Seeded state whose notification inbox refuses every write.
pub async fn seeded_state_without_notifications() -> web::Data<AppState> {
    let store = MuteInbox(MemoryStore::new());
    seed(&store, false, 4).await.expect("seed store");
    let tokens = TokenService::new("integration-secret", 24, 168);
    web::Data::new(AppState::new(Arc::new(store), tokens).with_bcrypt_cost(4))
}

/// Wraps a [`MemoryStore`] and fails notification inserts.
pub struct MuteInbox(pub MemoryStore);

#[async_trait]
impl Repository for MuteInbox {
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.0.find_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.0.find_user_by_email(email).await
    }
    async fn find_staff_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, StoreError> {
        self.0.find_staff_by_employee_id(employee_id).await
    }
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.0.list_users().await
    }
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        self.0.insert_user(user).await
    }
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.0.save_user(user).await
    }
    async fn count_users(&self) -> Result<u64, StoreError> {
        self.0.count_users().await
    }
    async fn find_resource(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        self.0.find_resource(id).await
    }
    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        self.0.list_resources().await
    }
    async fn insert_resource(&self, resource: Resource) -> Result<Resource, StoreError> {
        self.0.insert_resource(resource).await
    }
    async fn save_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        self.0.save_resource(resource).await
    }
    async fn delete_resource(&self, id: i64) -> Result<bool, StoreError> {
        self.0.delete_resource(id).await
    }
    async fn find_booking(&self, id: i64) -> Result<Option<Booking>, StoreError> {
        self.0.find_booking(id).await
    }
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        self.0.list_bookings(filter).await
    }
    async fn count_bookings(&self, filter: &BookingFilter) -> Result<u64, StoreError> {
        self.0.count_bookings(filter).await
    }
    async fn insert_booking(&self, booking: Booking, reject_overlap: bool) -> Result<Booking, StoreError> {
        self.0.insert_booking(booking, reject_overlap).await
    }
    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.0.save_booking(booking).await
    }
    async fn delete_booking(&self, id: i64) -> Result<bool, StoreError> {
        self.0.delete_booking(id).await
    }
    async fn find_meeting(&self, id: i64) -> Result<Option<MeetingSchedule>, StoreError> {
        self.0.find_meeting(id).await
    }
    async fn meetings_for(&self, user: i64) -> Result<Vec<MeetingSchedule>, StoreError> {
        self.0.meetings_for(user).await
    }
    async fn insert_meeting(&self, meeting: MeetingSchedule) -> Result<MeetingSchedule, StoreError> {
        self.0.insert_meeting(meeting).await
    }
    async fn insert_audit(&self, entry: AuditLog) -> Result<AuditLog, StoreError> {
        self.0.insert_audit(entry).await
    }
    async fn list_audit(&self) -> Result<Vec<AuditLog>, StoreError> {
        self.0.list_audit().await
    }
    async fn find_audit(&self, id: i64) -> Result<Option<AuditLog>, StoreError> {
        self.0.find_audit(id).await
    }
    async fn insert_notification(&self, _notification: Notification) -> Result<Notification, StoreError> {
        Err(StoreError::Corrupt("notifications are unavailable".to_string()))
    }
    async fn notifications_for(&self, user: i64) -> Result<Vec<Notification>, StoreError> {
        self.0.notifications_for(user).await
    }
    async fn find_notification(&self, id: i64) -> Result<Option<Notification>, StoreError> {
        self.0.find_notification(id).await
    }
    async fn save_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.0.save_notification(notification).await
    }
    async fn delete_notification(&self, id: i64) -> Result<bool, StoreError> {
        self.0.delete_notification(id).await
    }
    async fn mark_all_read(&self, user: i64) -> Result<u64, StoreError> {
        self.0.mark_all_read(user).await
    }
}

/// Serves the API on an ephemeral port and returns its `/api` base URL.
pub fn spawn_server(state: web::Data<AppState>) -> (String, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .expect("listen")
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{addr}/api"), handle)
}

macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .configure(campus_book::routes::configure),
        )
        .await
    };
}

/// Logs in and yields the access token.
macro_rules! login {
    ($app:expr, $who:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/login/")
            .set_json(serde_json::json!({ "email": $who.0, "password": $who.1 }))
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&$app, req).await;
        body["token"].as_str().expect("access token").to_string()
    }};
}

/// Sends a request with a bearer token and returns `(status, json body)`.
macro_rules! call {
    ($app:expr, $method:ident, $uri:expr, $token:expr) => {{
        let req = actix_web::test::TestRequest::$method()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        let status = resp.status();
        let bytes = actix_web::test::read_body(resp).await;
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }};
    ($app:expr, $method:ident, $uri:expr, $token:expr, $json:expr) => {{
        let req = actix_web::test::TestRequest::$method()
            .uri($uri)
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json($json)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        let status = resp.status();
        let bytes = actix_web::test::read_body(resp).await;
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }};
}
