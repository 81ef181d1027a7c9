use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::{looks_like_email, normalize_email, normalized_phone, pwhash, FieldErrors};
use crate::role::Role;
use crate::time::Timestamp;

/// A user row as stored, before the id and role have been checked.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub fullname: String,
    pub phone: String,
    pub role: String,
    pub pwhash: String,
    pub session_id: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip)]
    pub pwhash: String,
    #[serde(skip)]
    pub session_id: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = &'static str;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let UserRow {
            id,
            email,
            fullname,
            phone,
            role,
            pwhash,
            session_id,
            created_at,
        } = row;

        let id = Uuid::try_parse(&id).map_err(|_| "malformed user id")?;
        let role = Role::try_from(&*role).map_err(|()| "unknown role")?;

        Ok(Self {
            id,
            email,
            fullname,
            phone,
            role,
            pwhash,
            session_id,
            created_at,
        })
    }
}

/// Insert payload for a brand new account.
#[derive(Debug)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
    pub phone: String,
    pub role: Role,
    pub pwhash: String,
    pub created_at: Timestamp,
}

/// The back-office add-user form. Only staff roles can be granted here,
/// student accounts come from self signup.
#[derive(Debug, Deserialize)]
pub struct NewUserForm {
    pub fullname: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

impl NewUserForm {
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

        if self.phone.trim().is_empty() {
            errors.push("phone", "Phone number is required");
        } else if normalized_phone(&self.phone).is_none() {
            errors.push("phone", "Please enter a valid 10-digit phone number");
        }

        match self.role {
            Role::Admin | Role::Superadmin => {}
            Role::Student => {
                errors.push("role", "Role must be admin or superadmin");
            }
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

#[cfg(test)]
mod test {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: "550e8400-e29b-41d4-a716-446655440000".into(),
            email: "someone@example.com".into(),
            fullname: "Someone".into(),
            phone: "0123456789".into(),
            role: "admin".into(),
            pwhash: "abc".into(),
            session_id: None,
            created_at: Timestamp::from_i64(1),
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = UserRecord::try_from(row()).unwrap();
        assert_eq!(record.role, Role::Admin);
        assert_eq!(record.email, "someone@example.com");
    }

    #[test]
    fn malformed_rows_are_rejected() {
        let bad_id = UserRow {
            id: "not-a-uuid".into(),
            ..row()
        };
        assert_eq!(UserRecord::try_from(bad_id), Err("malformed user id"));

        let bad_role = UserRow {
            role: "owner".into(),
            ..row()
        };
        assert_eq!(UserRecord::try_from(bad_role), Err("unknown role"));
    }

    #[test]
    fn serialized_record_hides_secrets() {
        let mut record = UserRecord::try_from(row()).unwrap();
        record.session_id = Some("session".into());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("pwhash").is_none());
        assert!(json.get("session_id").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn staff_form_rejects_student_role() {
        let form = NewUserForm {
            fullname: "New Admin".into(),
            email: "admin@example.com".into(),
            phone: "0123456789".into(),
            password: "longenough".into(),
            role: Role::Student,
        };

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["role"]);
    }

    #[test]
    fn staff_form_messages_match_the_signup_ones() {
        let form = NewUserForm {
            fullname: " ".into(),
            email: "bad".into(),
            phone: "123".into(),
            password: "longenough".into(),
            role: Role::Admin,
        };

        let errors = form.validate().unwrap_err();
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({
                "fullname": "Name is required",
                "email": "Email is invalid",
                "phone": "Please enter a valid 10-digit phone number",
            }),
        );
    }
}
