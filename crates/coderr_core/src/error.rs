//! crates/coderr_core/src/error.rs
//!
//! The typed error taxonomy every marketplace operation returns.

use crate::ports::PortError;
use std::collections::BTreeMap;
use std::fmt;

/// Field-keyed validation messages, kept in field order so responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for an error set holding a single message.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> DomainResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, messages.join(" "))?;
            first = false;
        }
        Ok(())
    }
}

/// The error returned by every `Marketplace` operation.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Malformed, missing or contradictory input.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced id does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authenticated, but the policy denied the action.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// No valid identity is attached to the call.
    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthenticated,

    /// A store or collaborator failure with no domain meaning.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation(ValidationErrors::single(field, message))
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(errors)
    }
}

impl From<PortError> for DomainError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => DomainError::NotFound(what),
            PortError::Conflict(message) => DomainError::validation("non_field_errors", message),
            PortError::Unauthorized => DomainError::Unauthenticated,
            PortError::Unexpected(message) => DomainError::Internal(message),
        }
    }
}

/// A convenience type alias for `Result<T, DomainError>`.
pub type DomainResult<T> = Result<T, DomainError>;
