//! The managed record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of the managed table.
///
/// Columns map positionally as `(user_id, user_email, subject_id)`. The
/// serialized form uses the column names, so a record round-trips through
/// JSON as `{"user_id": .., "user_email": .., "subject_id": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Caller-supplied primary key.
    #[serde(rename = "user_id")]
    pub id: i64,
    /// Email address; not required to be unique.
    #[serde(rename = "user_email")]
    pub email: String,
    /// Association to an external subject. Not enforced as a foreign key.
    pub subject_id: i64,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(id: i64, email: impl Into<String>, subject_id: i64) -> Self {
        Self {
            id,
            email: email.into(),
            subject_id,
        }
    }

    /// Splits the record into its columns, in storage order.
    #[must_use]
    pub fn into_parts(self) -> (i64, String, i64) {
        (self.id, self.email, self.subject_id)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (subject {})",
            self.id, self.email, self.subject_id
        )
    }
}

impl From<(i64, String, i64)> for Record {
    fn from((id, email, subject_id): (i64, String, i64)) -> Self {
        Self {
            id,
            email,
            subject_id,
        }
    }
}

impl From<(i64, &str, i64)> for Record {
    fn from((id, email, subject_id): (i64, &str, i64)) -> Self {
        Self::new(id, email, subject_id)
    }
}
