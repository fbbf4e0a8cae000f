use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: Option<i64>,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditLogResponse {
    pub id: i64,
    pub user: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: i64,
    pub user: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationResponse {
    pub id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationResponse {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            message: n.message.clone(),
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotificationPatch {
    pub is_read: bool,
}
