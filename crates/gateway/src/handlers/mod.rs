//! API handlers module

pub mod chat;
pub mod documents;
pub mod health;
pub mod search;

use pitwall_common::errors::AppError;
use validator::ValidationErrors;

/// Convert validator output into a validation error naming a failing field
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().into_keys().min().map(|f| f.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
