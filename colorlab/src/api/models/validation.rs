//! Field checks shared by request models.
//!
//! Each helper returns the cleaned value or a `Validation` error naming the field.

use crate::errors::{Error, Result};

/// Maximum length of the short text columns (`VARCHAR(255)`)
pub const MAX_TEXT_LENGTH: usize = 255;

/// Trimmed, non-empty text of at most `max` characters
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("El campo {field} es obligatorio")));
    }
    if value.chars().count() > max {
        return Err(Error::validation(format!(
            "El campo {field} no puede tener más de {max} caracteres"
        )));
    }
    Ok(value.to_string())
}

/// Like [`required_text`] but passes `None` through
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    value.map(|v| required_text(field, v, max)).transpose()
}

/// Trimmed, lowercased address with a local part and a dotted domain
pub fn email(field: &str, value: &str) -> Result<String> {
    let value = required_text(field, value, MAX_TEXT_LENGTH)?.to_lowercase();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || value.contains(char::is_whitespace) {
        return Err(Error::validation(format!("El campo {field} debe ser un email válido")));
    }
    Ok(value)
}

pub fn positive_id(field: &str, value: i64) -> Result<i64> {
    if value <= 0 {
        return Err(Error::validation(format!("El campo {field} debe ser un entero positivo")));
    }
    Ok(value)
}
