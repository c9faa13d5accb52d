//! Statement parameter values.

/// A value bound to a statement placeholder.
///
/// The managed table only holds integers and text, so this is all a
/// statement ever needs to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// A 64-bit integer (`user_id`, `subject_id`).
    Integer(i64),
    /// A text value (`user_email`).
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
