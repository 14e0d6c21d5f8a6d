//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::{CoreError, CoreResult};

/// Validate that an amount is strictly positive
pub fn validate_positive_amount(amount: &BigDecimal) -> CoreResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(CoreError::Validation(
            "amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate an account code (chart identifiers like "1000")
pub fn validate_account_code(code: &str) -> CoreResult<()> {
    if code.trim().is_empty() {
        return Err(CoreError::Validation(
            "account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(CoreError::Validation(
            "account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(
            "account code can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate an account name
pub fn validate_account_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(CoreError::Validation(
            "account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a journal entry or document description
pub fn validate_description(description: &str) -> CoreResult<()> {
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(CoreError::Validation(
            "description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}
