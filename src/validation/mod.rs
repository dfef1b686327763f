use bigdecimal::BigDecimal;
use std::fmt;

pub const DONATION_MESSAGE_MAX_LEN: usize = 500;
pub const INVOICE_DESCRIPTION_MAX_LEN: usize = 255;

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

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Matches the `NUMERIC(20, 2)` amount columns.
pub const AMOUNT_MAX_SCALE: i64 = 2;
const AMOUNT_MAX_INTEGER_DIGITS: u32 = 18;

pub fn validate_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    if amount >= &BigDecimal::from(10u64.pow(AMOUNT_MAX_INTEGER_DIGITS)) {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} integer digits", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(())
}

pub fn validate_positive_id(field: &'static str, id: i64) -> ValidationResult {
    if id <= 0 {
        return Err(ValidationError::new(field, "must be a positive id"));
    }

    Ok(())
}

/// Sanitizes a donor message and checks its length.
pub fn clean_message(message: &str) -> Result<String, ValidationError> {
    let message = sanitize_string(message);
    validate_max_len("message", &message, DONATION_MESSAGE_MAX_LEN)?;
    Ok(message)
}

/// Clips text to `max_len` characters on a char boundary.
pub fn truncate_chars(value: &str, max_len: usize) -> String {
    value.chars().take(max_len).collect()
}
