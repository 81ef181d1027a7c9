use serde::Deserialize;

use crate::auth::{looks_like_email, FieldErrors};

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
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

        if self.message.trim().is_empty() {
            errors.push("message", "Message is required");
        }

        errors.into_result()
    }
}
