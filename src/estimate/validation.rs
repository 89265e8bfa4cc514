//! Input validation for estimate and paver block forms.
//!
//! Every failing field is collected so a form submission reports all
//! problems at once.

use rust_decimal::Decimal;
use std::fmt;

use super::model::{MAX_AMOUNT, MAX_PERCENTAGE};

/// Validation error with a user-facing message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} must not be empty", label))
    }

    pub fn too_long(field: &str, max_chars: usize) -> Self {
        Self::new(field, format!("must be at most {} characters", max_chars))
    }

    pub fn negative_amount(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} cannot be negative", label))
            .with_suggestion("Enter 0 if there is no charge")
    }

    pub fn amount_out_of_range(field: &str, label: &str, max: Decimal) -> Self {
        Self::new(field, format!("{} cannot exceed {}", label, max))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn to_message(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Validation failed: {} error(s) found",
            self.errors.len()
        )];
        for (i, error) in self.errors.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, error));
        }
        parts.join("\n")
    }

    /// Ok if no errors, Err with formatted message if errors exist
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.to_message())
        }
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

/// Validate a `decimal(10,2)` money amount
pub fn validate_amount(value: Decimal, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.is_sign_negative() && !value.is_zero() {
        errors.add(ValidationError::negative_amount(field, label));
    } else if value > MAX_AMOUNT {
        errors.add(ValidationError::amount_out_of_range(field, label, MAX_AMOUNT));
    }
}

/// Validate a `decimal(5,2)` percentage
pub fn validate_percentage(value: Decimal, field: &str, errors: &mut ValidationErrors) {
    if value.is_sign_negative() && !value.is_zero() {
        errors.add(ValidationError::negative_amount(field, "GST percentage"));
    } else if value > MAX_PERCENTAGE {
        errors.add(ValidationError::amount_out_of_range(
            field,
            "GST percentage",
            MAX_PERCENTAGE,
        ));
    }
}
