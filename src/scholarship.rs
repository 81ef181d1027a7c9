use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::FieldErrors;
use crate::time::{parse_deadline, today, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ScholarshipRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// `YYYY-MM-DD`, validated on the way in.
    pub deadline: String,
    pub host_country: String,
    pub benefits: String,
    pub eligibility: String,
    pub degree_level: String,
    pub link: String,
    pub author: String,
    pub created_at: Timestamp,
}

/// Submission shape shared by posting and updating. Updates accept past
/// deadlines so an already-expired listing can still be corrected.
#[derive(Debug, Clone, Deserialize)]
pub struct ScholarshipDraft {
    pub name: String,
    pub description: String,
    pub deadline: String,
    pub host_country: String,
    pub benefits: String,
    pub eligibility: String,
    pub degree_level: String,
    pub link: String,
    pub author: String,
}

impl ScholarshipDraft {
    fn validate_required(&self, errors: &mut FieldErrors) {
        if self.name.trim().is_empty() {
            errors.push("name", "Scholarship name is required.");
        }
        if self.description.trim().is_empty() {
            errors.push("description", "Description is required.");
        }
        if self.deadline.is_empty() {
            errors.push("deadline", "Deadline is required.");
        } else if parse_deadline(&self.deadline).is_err() {
            errors.push("deadline", "Deadline must be a valid date.");
        }
        if self.host_country.trim().is_empty() {
            errors.push("host_country", "Host country is required.");
        }
        if self.benefits.trim().is_empty() {
            errors.push("benefits", "Benefits are required.");
        }
        if self.eligibility.trim().is_empty() {
            errors.push("eligibility", "Eligibility criteria are required.");
        }
        if self.degree_level.trim().is_empty() {
            errors.push("degree_level", "Degree level is required.");
        }
        if self.link.trim().is_empty() {
            errors.push("link", "Link is required.");
        }
        if self.author.trim().is_empty() {
            errors.push("author", "Author is required.");
        }
    }

    pub fn validate_new(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        self.validate_required(&mut errors);

        // today itself is accepted, only strictly-past deadlines fail
        if let Ok(deadline) = parse_deadline(&self.deadline) {
            if deadline < today() {
                errors.push("deadline", "Deadline must be a future date.");
            }
        }

        errors.into_result()
    }

    pub fn validate_update(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        self.validate_required(&mut errors);
        errors.into_result()
    }
}

/// Filters for the public listing. All optional, combined with AND.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
    pub country: Option<String>,
    pub degree_level: Option<String>,
    /// Keep only listings whose deadline is after today.
    pub ongoing: Option<bool>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ScholarshipPage {
    pub scholarships: Vec<ScholarshipRecord>,
    /// Distinct values for the filter dropdowns.
    pub countries: Vec<String>,
    pub degree_levels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScholarshipDetail {
    #[serde(flatten)]
    pub scholarship: ScholarshipRecord,
    pub benefit_lines: Vec<String>,
    pub eligibility_lines: Vec<String>,
}

impl ScholarshipDetail {
    pub fn new(scholarship: ScholarshipRecord) -> Self {
        let benefit_lines = bullet_lines(&scholarship.benefits);
        let eligibility_lines = bullet_lines(&scholarship.eligibility);

        Self {
            scholarship,
            benefit_lines,
            eligibility_lines,
        }
    }
}

/// One bullet per non-blank line.
pub fn bullet_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
