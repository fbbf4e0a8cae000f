use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Student,
    Staff,
    LabIncharge,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Staff => "STAFF",
            Role::LabIncharge => "LAB_INCHARGE",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "STAFF" => Ok(Role::Staff),
            "LAB_INCHARGE" => Ok(Role::LabIncharge),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

/// Stored user record. Never serialized to API callers directly.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub department: Option<String>,
    pub roll_number: Option<String>,
    pub employee_id: Option<String>,
    pub designation: Option<String>,
    #[serde(default)]
    pub failed_login_attempts: u32,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub current_session: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.account_locked_until.map_or(false, |until| now < until)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Roll number for students, employee id for everyone else.
    pub fn id_ref(&self) -> Option<String> {
        self.roll_number.clone().or_else(|| self.employee_id.clone())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub department: Option<String>,
    pub roll_number: Option<String>,
    pub employee_id: Option<String>,
    pub designation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            status: user.status,
            department: user.department.clone(),
            roll_number: user.roll_number.clone(),
            employee_id: user.employee_id.clone(),
            designation: user.designation.clone(),
            created_at: user.created_at,
        }
    }
}

/// Admin edits. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub department: Option<String>,
    pub roll_number: Option<String>,
    pub employee_id: Option<String>,
    pub designation: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub sid: String,
    pub typ: TokenKind,
    pub exp: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StudentStats {
    pub upcoming: u64,
    pub pending: u64,
    pub completed: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DashboardStats {
    pub total_users: u64,
    pub active_bookings: u64,
    pub pending_approvals: u64,
    pub total_resources: u64,
}
