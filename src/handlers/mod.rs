pub mod audit;
pub mod auth;
pub mod bookings;
pub mod meetings;
pub mod notifications;
pub mod resources;
pub mod users;

use std::collections::HashMap;

use actix_web::HttpRequest;
use chrono::Utc;
use log::{debug, warn};

use crate::db::Repository;
use crate::error::{ApiError, StoreError};
use crate::models::{AuditLog, Notification, Resource, User};

pub(crate) const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub(crate) const NOT_FOUND: &str = "Not found.";

pub(crate) fn require(allowed: bool) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(PERMISSION_DENIED))
    }
}

pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    req.peer_addr().map(|addr| addr.ip().to_string())
}

pub(crate) async fn record_audit(
    repo: &dyn Repository,
    user: Option<i64>,
    action: &str,
    details: String,
    ip_address: Option<String>,
) -> Result<(), StoreError> {
    debug!("audit {}: {}", action, details);
    repo.insert_audit(AuditLog {
        id: 0,
        user,
        action: action.to_string(),
        details,
        timestamp: Utc::now(),
        ip_address,
    })
    .await?;
    Ok(())
}

pub(crate) async fn notify(repo: &dyn Repository, user: i64, message: String) -> Result<(), StoreError> {
    repo.insert_notification(Notification {
        id: 0,
        user,
        message,
        is_read: false,
        created_at: Utc::now(),
    })
    .await?;
    Ok(())
}

/// Side effects that run after a write has been committed. A failure is
/// logged and the request still reports the committed result.
pub(crate) fn after_commit(what: &str, result: Result<(), StoreError>) {
    if let Err(e) = result {
        warn!("{} failed after commit: {}", what, e);
    }
}

/// Users and resources loaded once per request to fill in display names.
pub(crate) struct Lookup {
    users: HashMap<i64, User>,
    resources: HashMap<i64, Resource>,
}

impl Lookup {
    pub async fn load(repo: &dyn Repository) -> Result<Self, StoreError> {
        let users = repo.list_users().await?.into_iter().map(|u| (u.id, u)).collect();
        let resources = repo
            .list_resources()
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        Ok(Self { users, resources })
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_name(&self, id: i64) -> Option<String> {
        self.user(id).map(|u| u.username.clone())
    }

    pub fn resource_name(&self, id: i64) -> Option<String> {
        self.resources.get(&id).map(|r| r.name.clone())
    }
}
