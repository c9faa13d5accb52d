//! Search filters.

/// Filter criteria for record search.
///
/// Every criterion is optional. Present criteria are combined with AND; an
/// empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Case-sensitive substring the email must contain.
    pub email_contains: Option<String>,
    /// Inclusive lower bound on `subject_id`.
    pub min_subject_id: Option<i64>,
    /// Inclusive upper bound on `subject_id`.
    pub max_subject_id: Option<i64>,
}

impl SearchFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            email_contains: None,
            min_subject_id: None,
            max_subject_id: None,
        }
    }

    /// Requires the email to contain `fragment`.
    #[must_use]
    pub fn with_email_containing(mut self, fragment: impl Into<String>) -> Self {
        self.email_contains = Some(fragment.into());
        self
    }

    /// Sets the inclusive minimum subject id.
    #[must_use]
    pub const fn with_min_subject_id(mut self, min: i64) -> Self {
        self.min_subject_id = Some(min);
        self
    }

    /// Sets the inclusive maximum subject id.
    #[must_use]
    pub const fn with_max_subject_id(mut self, max: i64) -> Self {
        self.max_subject_id = Some(max);
        self
    }

    /// Returns the email fragment, treating an empty string as absent.
    #[must_use]
    pub fn email_fragment(&self) -> Option<&str> {
        self.email_contains.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns true if the filter is empty (matches all).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email_fragment().is_none()
            && self.min_subject_id.is_none()
            && self.max_subject_id.is_none()
    }

    /// Evaluates the filter against a record in memory.
    ///
    /// Mirrors the predicate the store compiles to SQL.
    #[must_use]
    pub fn matches(&self, record: &super::Record) -> bool {
        self.email_fragment()
            .is_none_or(|fragment| record.email.contains(fragment))
            && self.min_subject_id.is_none_or(|min| record.subject_id >= min)
            && self.max_subject_id.is_none_or(|max| record.subject_id <= max)
    }
}
