use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-field validation messages, keyed by the field that failed.
/// Replies carry these inline so a form can re-render without losing
/// the rest of its input.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[cfg(test)]
    pub fn fields(&self) -> Vec<&'static str> {
        self.0.keys().copied().collect()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !local.chars().any(char::is_whitespace)
        && !domain.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
}

/// Accepts digits with optional dashes/spaces, exactly ten digits once
/// those are stripped.
pub fn normalized_phone(s: &str) -> Option<String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();

    if digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

pub fn pwhash(email: &str, password: &str) -> String {
    sha256::digest(format!("{email}:{password}"))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.email.trim().is_empty() {
            errors.push("email", "Email is required");
        } else if !looks_like_email(self.email.trim()) {
            errors.push("email", "Email is invalid");
        }

        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }

        errors.into_result()
    }

    pub fn email_normalized(&self) -> String {
        normalize_email(&self.email)
    }

    pub fn calc_pwhash(&self) -> String {
        pwhash(&self.email_normalized(), &self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.fullname.trim().is_empty() {
            errors.push("fullname", "Name is required");
        }

        if self.email.trim().is_empty() {
            errors.push("email", "Email is required");
        } else if !looks_like_email(self.email.trim()) {
            errors.push("email", "Email is invalid");
        }

        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password.len() < 6 {
            errors.push("password", "Password must be at least 6 characters");
        }

        if self.confirm_password != self.password {
            errors.push("confirm_password", "Passwords do not match");
        }

        if self.phone.trim().is_empty() {
            errors.push("phone", "Phone number is required");
        } else if normalized_phone(&self.phone).is_none() {
            errors.push("phone", "Please enter a valid 10-digit phone number");
        }

        errors.into_result()
    }

    pub fn email_normalized(&self) -> String {
        normalize_email(&self.email)
    }

    pub fn calc_pwhash(&self) -> String {
        pwhash(&self.email_normalized(), &self.password)
    }
}
