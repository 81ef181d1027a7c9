use serde::Deserialize;

use crate::auth::{looks_like_email, normalize_email, FieldErrors};

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeForm {
    pub name: String,
    pub email: String,
}

impl SubscribeForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        }

        if self.email.trim().is_empty() {
            errors.push("email", "Email is required");
        } else if !looks_like_email(self.email.trim()) {
            errors.push("email", "Email is invalid");
        }

        errors.into_result()
    }

    pub fn email_normalized(&self) -> String {
        normalize_email(&self.email)
    }
}
