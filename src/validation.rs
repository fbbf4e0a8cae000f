//! Input checks shared by the API handlers and the client.

use std::collections::BTreeMap;

use crate::models::{BookingType, LoginRequest, Role, SignupRequest};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MIN_ESCALATED_JUSTIFICATION: usize = 20;
pub const MIN_NORMAL_JUSTIFICATION: usize = 10;

/// Per-field errors in the order the checks ran.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors {
    entries: Vec<(String, String)>,
}

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.entries.push((field.to_owned(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(f, _)| f == field)
    }

    /// `"<field>: <message>"` for the first failing field.
    pub fn first_message(&self) -> Option<String> {
        self.entries
            .first()
            .map(|(field, message)| format!("{field}: {message}"))
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, message) in &self.entries {
            map.entry(field.clone()).or_default().push(message.clone());
        }
        map
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

pub fn validate_signup(req: &SignupRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if req.name.trim().chars().count() < MIN_NAME_LEN {
        errors.push("name", "Name must be at least 2 characters");
    }
    if !is_valid_email(req.email.trim()) {
        errors.push("email", "Please enter a valid email address");
    }
    if req.phone.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS {
        errors.push("phone", "Phone number must be at least 10 digits");
    }
    if req.role == Some(Role::Admin) {
        errors.push("role", "Administrator accounts cannot be self-registered");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("password", "Password must be at least 8 characters");
    }
    if req.password != req.confirm_password {
        errors.push("confirmPassword", "Passwords don't match");
    }
    errors.into_result()
}

pub fn validate_login(req: &LoginRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if !is_valid_email(req.email.trim()) {
        errors.push("email", "Please enter a valid email address");
    }
    if req.password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.into_result()
}

/// Special events and faculty meetings need a detailed reason; a normal
/// booking may omit one but must not be a throwaway word.
pub fn validate_justification(kind: BookingType, justification: Option<&str>) -> Result<(), String> {
    let len = justification.map_or(0, |j| j.trim().chars().count());
    match kind {
        BookingType::Special | BookingType::Meeting if len < MIN_ESCALATED_JUSTIFICATION => Err(format!(
            "Please provide a detailed justification (min {MIN_ESCALATED_JUSTIFICATION} chars)"
        )),
        BookingType::Normal if len > 0 && len < MIN_NORMAL_JUSTIFICATION => Err(format!(
            "Justification must be detailed (at least {MIN_NORMAL_JUSTIFICATION} chars)"
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn signup() -> SignupRequest {
        SignupRequest {
            name: "Asha Menon".into(),
            email: "asha@campus.edu".into(),
            phone: "98765 43210".into(),
            password: "longenough".into(),
            confirm_password: "longenough".into(),
            role: Some(Role::Student),
            ..SignupRequest::default()
        }
    }

    #[rstest]
    #[case("asha@campus.edu", true)]
    #[case("a.b+c@dept.campus.edu", true)]
    #[case("asha@campus", false)]
    #[case("@campus.edu", false)]
    #[case("asha campus@x.edu", false)]
    #[case("asha@@campus.edu", false)]
    #[case("", false)]
    fn email_shape(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(is_valid_email(email), valid);
    }

    #[test]
    fn accepts_a_complete_signup() {
        assert!(validate_signup(&signup()).is_ok());
    }

    #[test]
    fn short_password_is_reported_first_by_field_order() {
        let req = SignupRequest {
            password: "short".into(),
            confirm_password: "other".into(),
            ..signup()
        };
        let errors = validate_signup(&req).unwrap_err();
        assert_eq!(
            errors.first_message().as_deref(),
            Some("password: Password must be at least 8 characters")
        );
        assert!(errors.contains("confirmPassword"));
        assert_eq!(errors.to_map().len(), 2);
    }

    #[test]
    fn admin_self_signup_is_refused() {
        let req = SignupRequest {
            role: Some(Role::Admin),
            ..signup()
        };
        assert!(validate_signup(&req).unwrap_err().contains("role"));
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = validate_login(&LoginRequest::default()).unwrap_err();
        assert!(errors.contains("email"));
        assert!(errors.contains("password"));
    }

    #[rstest]
    #[case(BookingType::Special, None, false)]
    #[case(BookingType::Special, Some("Annual symposium"), false)]
    #[case(BookingType::Special, Some("Annual physics symposium for 120 guests"), true)]
    #[case(BookingType::Meeting, Some("Project review for the final year thesis"), true)]
    #[case(BookingType::Normal, None, true)]
    #[case(BookingType::Normal, Some("lab"), false)]
    #[case(BookingType::Normal, Some("Optics practical session"), true)]
    fn justification_lengths(
        #[case] kind: BookingType,
        #[case] justification: Option<&str>,
        #[case] valid: bool,
    ) {
        assert_eq!(validate_justification(kind, justification).is_ok(), valid);
    }
}
