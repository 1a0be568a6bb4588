//! Input validation for patient phone numbers, lot numbers and quantities

use crate::error::ErrorCode;

/// Validation errors for caller-supplied fields
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid phone number: '{0}'")]
    InvalidPhone(String),

    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Quantity must be greater than zero")]
    ZeroQuantity,
}

impl From<ValidationError> for ErrorCode {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidPhone(_) => ErrorCode::InvalidPhone,
            ValidationError::InvalidLength { .. } | ValidationError::ZeroQuantity => {
                ErrorCode::InvalidQuantity
            }
        }
    }
}

/// Normalize a mobile phone number to its canonical digit form.
///
/// Separators (spaces, dashes, dots, parentheses) are dropped and a `+82`
/// country prefix is rewritten to the domestic leading `0`. The result must be
/// 10-11 digits starting with `01`.
///
/// ```
/// use medtrace::validation::normalize_phone;
/// assert_eq!(normalize_phone("010-1234-5678").unwrap(), "01012345678");
/// assert_eq!(normalize_phone("+82 10 1234 5678").unwrap(), "01012345678");
/// ```
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(ValidationError::InvalidPhone(raw.to_string())),
        }
    }

    let normalized = if trimmed.starts_with('+') {
        match digits.strip_prefix("82") {
            Some(rest) => format!("0{}", rest.trim_start_matches('0')),
            None => return Err(ValidationError::InvalidPhone(raw.to_string())),
        }
    } else {
        digits
    };

    if !(10..=11).contains(&normalized.len()) || !normalized.starts_with("01") {
        return Err(ValidationError::InvalidPhone(raw.to_string()));
    }
    Ok(normalized)
}

/// Validate a lot number: 1-64 visible characters after trimming
pub fn validate_lot_number(lot_number: &str) -> Result<&str, ValidationError> {
    let trimmed = lot_number.trim();
    if trimmed.is_empty() || trimmed.len() > 64 {
        return Err(ValidationError::InvalidLength {
            field: "lot_number",
            min: 1,
            max: 64,
            actual: trimmed.len(),
        });
    }
    Ok(trimmed)
}

/// Validate a requested quantity
#[inline]
pub fn validate_quantity(quantity: u32) -> Result<u32, ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::ZeroQuantity);
    }
    Ok(quantity)
}

/// True if `text` has visible content
#[inline]
pub fn is_blank(text: Option<&str>) -> bool {
    text.is_none_or(|t| t.trim().is_empty())
}
