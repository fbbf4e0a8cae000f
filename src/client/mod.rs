//! HTTP client for the booking API.
//!
//! Every call attaches the stored access token. A 401 wipes the stored tokens
//! and surfaces as [`ClientError::Unauthorized`], so callers only need to send
//! the user back to `login`.

mod error;
mod token;

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub use error::ClientError;
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, Tokens};

use crate::models::{
    AuditLogResponse, AuthResponse, BookingResponse, BusySlot, CreateBookingRequest,
    CreateMeetingRequest, DashboardStats, DecisionRequest, DecisionResponse, LoginRequest,
    MeetingResponse, NotificationPatch, NotificationResponse, RefreshRequest, RefreshResponse,
    ResourcePayload, ResourceResponse, Role, SignupRequest, StudentStats, UserResponse,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let builder = self.http.request(method, self.url(path));
        Ok(match self.tokens.load()? {
            Some(tokens) => builder.bearer_auth(tokens.access),
            None => builder,
        })
    }

    /// Sends the request and reports any non-success status as [`ClientError::Api`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error::error_message(status, &body),
        })
    }

    /// Like [`send`](Self::send) for calls made under the stored session,
    /// where a 401 means that session is over.
    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        match self.send(builder).await {
            Err(ClientError::Api { status: 401, message }) => {
                warn!("Request rejected as unauthorized: {}", message);
                self.tokens.clear()?;
                Err(ClientError::Unauthorized)
            }
            Err(ClientError::Api { status: 403, message }) => Err(ClientError::Forbidden(message)),
            other => other,
        }
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.dispatch(builder).await?.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call(self.request(Method::GET, path)?).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.call(self.request(method, path)?.json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.dispatch(self.request(Method::DELETE, path)?).await?;
        Ok(())
    }

    // auth

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send(self.http.post(self.url("auth/login/")).json(&body))
            .await?
            .json()
            .await?;
        self.tokens.save(&Tokens {
            access: auth.token.clone(),
            refresh: auth.refresh.clone(),
        })?;
        debug!("Logged in as {}", auth.user.email);
        Ok(auth)
    }

    /// Ends the server session when possible; local tokens are dropped either way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let outcome = match self.tokens.load()? {
            Some(_) => self
                .dispatch(self.request(Method::POST, "auth/logout/")?)
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        self.tokens.clear()?;
        match outcome {
            Err(ClientError::Unauthorized) => Ok(()),
            other => other,
        }
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<UserResponse, ClientError> {
        self.tokens.clear()?;
        self.call(self.http.post(self.url("auth/register/")).json(request))
            .await
    }

    /// Swaps the stored refresh token for a fresh access token.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let tokens = self.tokens.load()?.ok_or(ClientError::NotLoggedIn)?;
        let body = RefreshRequest {
            refresh: tokens.refresh.clone(),
        };
        let response = match self
            .send(self.http.post(self.url("auth/token/refresh/")).json(&body))
            .await
        {
            Err(e @ ClientError::Api { status: 401, .. }) => {
                self.tokens.clear()?;
                return Err(e);
            }
            other => other?,
        };
        let response: RefreshResponse = response.json().await?;
        self.tokens.save(&Tokens {
            access: response.access.clone(),
            refresh: tokens.refresh,
        })?;
        Ok(response.access)
    }

    // bookings

    pub async fn create_booking(
        &self,
        request: &CreateBookingRequest,
    ) -> Result<BookingResponse, ClientError> {
        self.send_json(Method::POST, "bookings/", request).await
    }

    pub async fn list_bookings(&self) -> Result<Vec<BookingResponse>, ClientError> {
        self.get("bookings/").await
    }

    pub async fn get_booking(&self, id: i64) -> Result<BookingResponse, ClientError> {
        self.get(&format!("bookings/{id}/")).await
    }

    pub async fn cancel_booking(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("bookings/{id}/")).await
    }

    pub async fn availability(&self, resource: i64, date: NaiveDate) -> Result<Vec<BusySlot>, ClientError> {
        let builder = self
            .request(Method::GET, "bookings/availability/")?
            .query(&[("resource", resource.to_string()), ("date", date.to_string())]);
        self.call(builder).await
    }

    pub async fn approve_booking(&self, id: i64, remarks: Option<&str>) -> Result<DecisionResponse, ClientError> {
        let body = DecisionRequest {
            remarks: remarks.map(str::to_owned),
        };
        self.send_json(Method::POST, &format!("bookings/{id}/approve/"), &body)
            .await
    }

    pub async fn reject_booking(&self, id: i64, remarks: &str) -> Result<DecisionResponse, ClientError> {
        let body = DecisionRequest {
            remarks: Some(remarks.to_string()),
        };
        self.send_json(Method::POST, &format!("bookings/{id}/reject/"), &body)
            .await
    }

    // resources

    pub async fn list_resources(&self) -> Result<Vec<ResourceResponse>, ClientError> {
        self.get("resources/").await
    }

    pub async fn get_resource(&self, id: i64) -> Result<ResourceResponse, ClientError> {
        self.get(&format!("resources/{id}/")).await
    }

    pub async fn create_resource(&self, payload: &ResourcePayload) -> Result<ResourceResponse, ClientError> {
        self.send_json(Method::POST, "resources/", payload).await
    }

    pub async fn update_resource(
        &self,
        id: i64,
        payload: &ResourcePayload,
    ) -> Result<ResourceResponse, ClientError> {
        self.send_json(Method::PATCH, &format!("resources/{id}/"), payload)
            .await
    }

    pub async fn delete_resource(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("resources/{id}/")).await
    }

    // users

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, ClientError> {
        self.get("users/").await
    }

    pub async fn users_by_role(&self, role: Role) -> Result<Vec<UserResponse>, ClientError> {
        let builder = self
            .request(Method::GET, "users/")?
            .query(&[("role", role.as_str())]);
        self.call(builder).await
    }

    pub async fn get_user(&self, id: i64) -> Result<UserResponse, ClientError> {
        self.get(&format!("users/{id}/")).await
    }

    pub async fn deactivate_user(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("users/{id}/")).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        self.get("users/dashboard_stats/").await
    }

    pub async fn student_stats(&self) -> Result<StudentStats, ClientError> {
        self.get("users/student_stats/").await
    }

    // meetings

    pub async fn list_meetings(&self) -> Result<Vec<MeetingResponse>, ClientError> {
        self.get("meetings/").await
    }

    pub async fn create_meeting(&self, request: &CreateMeetingRequest) -> Result<MeetingResponse, ClientError> {
        self.send_json(Method::POST, "meetings/", request).await
    }

    // notifications

    pub async fn notifications(&self) -> Result<Vec<NotificationResponse>, ClientError> {
        self.get("notifications/").await
    }

    pub async fn mark_read(&self, id: i64) -> Result<NotificationResponse, ClientError> {
        self.send_json(
            Method::PATCH,
            &format!("notifications/{id}/"),
            &NotificationPatch { is_read: true },
        )
        .await
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .send_json(Method::POST, "notifications/mark_all_read/", &json!({}))
            .await?;
        Ok(())
    }

    // audit

    pub async fn audit_logs(&self) -> Result<Vec<AuditLogResponse>, ClientError> {
        self.get("audit/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_base_url() {
        let client = ApiClient::new("http://localhost:8000/api/", Arc::new(MemoryTokenStore::new()));
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/bookings/"), "http://localhost:8000/api/bookings/");
        assert_eq!(client.url("users/7/"), "http://localhost:8000/api/users/7/");
    }

    #[actix_rt::test]
    async fn refresh_without_tokens_is_not_logged_in() {
        let client = ApiClient::new(DEFAULT_BASE_URL, Arc::new(MemoryTokenStore::new()));
        assert!(matches!(client.refresh().await, Err(ClientError::NotLoggedIn)));
    }
}
