use super::user::{Role, User};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "confirmPassword", default)]
    pub confirm_password: String,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub roll_number: Option<String>,
    pub employee_id: Option<String>,
    pub designation: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub token: String,
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RefreshResponse {
    pub access: String,
}
