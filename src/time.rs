use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};

use ::time::format_description::FormatItem;
use ::time::macros::format_description;
use ::time::{Date, OffsetDateTime};

/// Seconds since the unix epoch, as stored in every `created_at` column.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Result<Self, ()> {
        use std::time::SystemTime;

        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_secs() as i64)
            .map(Self)
            .map_err(|e| {
                error!("couldn't get time: {e:?}");
            })
    }

    #[cfg(test)]
    pub fn from_i64(secs: i64) -> Self {
        Self(secs)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(fmt, "<epoch>");
        }

        use ::time::format_description::well_known::Rfc3339;

        let formatted = OffsetDateTime::from_unix_timestamp(self.0)
            .ok()
            .and_then(|when| when.format(&Rfc3339).ok());

        match formatted {
            Some(s) => write!(fmt, "{}", s),
            None => write!(fmt, "{}", self.0),
        }
    }
}

// Deadlines travel as `YYYY-MM-DD` strings, compared lexically in sql and
// parsed only when a form needs validating.
const DEADLINE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_deadline(s: &str) -> Result<Date, ()> {
    Date::parse(s, DEADLINE_FORMAT).map_err(|_| ())
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn today_string() -> String {
    today()
        .format(DEADLINE_FORMAT)
        .unwrap_or_else(|_| String::new())
}
