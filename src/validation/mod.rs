use bigdecimal::{BigDecimal, Zero};
use std::fmt;

use crate::domain::TransactionRequest;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const AMOUNT_MAX_SCALE: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_positive_id(field: &'static str, value: i64) -> ValidationResult {
    if value <= 0 {
        return Err(ValidationError::new(field, "must be a positive id"));
    }

    Ok(())
}

/// Amounts must be positive and fit the store's NUMERIC(20, 4) column.
pub fn validate_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::zero() {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    let (_, scale) = normalize_amount(amount).as_bigint_and_exponent();
    if scale > AMOUNT_MAX_SCALE {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    Ok(())
}

/// JSON numbers are decoded through f64 and carry trailing zeros to ~15 places;
/// strips them so `100.5` is judged and stored as `100.5`.
pub fn normalize_amount(amount: &BigDecimal) -> BigDecimal {
    let (_, scale) = amount.as_bigint_and_exponent();
    if scale > AMOUNT_MAX_SCALE {
        amount.normalized()
    } else {
        amount.clone()
    }
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_required("currency", currency)?;

    let code = currency.trim();
    if code.len() != CURRENCY_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            "currency",
            format!("must be a {}-letter ISO 4217 code", CURRENCY_CODE_LEN),
        ));
    }

    Ok(())
}

pub fn validate_transaction_request(request: &TransactionRequest) -> ValidationResult {
    validate_positive_id("user_id", request.user_id)?;
    validate_positive_id("country_id", request.country_id)?;
    validate_amount(&request.amount)?;
    validate_currency(&request.currency)?;
    Ok(())
}
