//! Argument checks shared by the CLI adapters.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"^[^\s]+$").expect("valid token pattern");
    static ref LABEL_NAME: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid label name pattern");
    static ref KEY_VALUE: Regex = Regex::new(r"^[^\s=-][^\s=]*=[^\s]*$").expect("valid key=value pattern");
}

/// Require a single non-empty argv token (ids, names, keys) that cannot be read as a flag.
pub fn token<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(Error::Validation(format!("{} must not be empty", field)))
    } else if value.starts_with('-') {
        Err(Error::Validation(format!("{} must not start with '-': '{}'", field, value)))
    } else if TOKEN.is_match(value) {
        Ok(value)
    } else {
        Err(Error::Validation(format!("{} must not contain whitespace: '{}'", field, value)))
    }
}

pub fn optional_token<'a>(field: &str, value: Option<&'a str>) -> Result<Option<&'a str>> {
    match value {
        Some(v) if !v.is_empty() => token(field, v).map(Some),
        _ => Ok(None),
    }
}

/// Require a Prometheus label name, safe to use as a URL path segment.
pub fn label_name<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    if LABEL_NAME.is_match(value) {
        Ok(value)
    } else {
        Err(Error::Validation(format!(
            "{} must be a label name matching [a-zA-Z_][a-zA-Z0-9_]*, got '{}'",
            field, value
        )))
    }
}

/// Require a `key=value` pair.
pub fn key_value<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    if KEY_VALUE.is_match(value) {
        Ok(value)
    } else {
        Err(Error::Validation(format!("{} entries must look like key=value, got '{}'", field, value)))
    }
}
