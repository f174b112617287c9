//! Request field validation shared by the write handlers.

use std::{str::FromStr, sync::LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use super::ApiError;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
});

pub(super) fn parse_url_or_validation_error(
    request_id: &str,
    value: &str,
    invalid_message: impl FnOnce(&str) -> String,
) -> Result<reqwest::Url, ApiError> {
    reqwest::Url::parse(value).map_err(|_| ApiError::validation(request_id, invalid_message(value)))
}

/// Websites must be absolute `http`/`https` URLs.
pub(super) fn validate_website(request_id: &str, value: &str) -> Result<(), ApiError> {
    let url = parse_url_or_validation_error(request_id, value, |v| {
        format!("'website' must be a valid URL, got '{v}'")
    })?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(ApiError::validation(
            request_id,
            format!("'website' must use http or https, got '{value}'"),
        ))
    }
}

pub(super) fn validate_email(request_id: &str, field: &str, value: &str) -> Result<(), ApiError> {
    if EMAIL_PATTERN.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ApiError::validation(
            request_id,
            format!("'{field}' must be a valid email address, got '{value}'"),
        ))
    }
}

/// Trim a required text field and reject blank or overlong values.
pub(super) fn required_text<'a>(
    request_id: &str,
    field: &str,
    value: &'a str,
    max_len: usize,
) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_len {
        return Err(ApiError::validation(
            request_id,
            format!("'{field}' must be 1-{max_len} characters"),
        ));
    }
    Ok(trimmed)
}

pub(super) fn positive_quantity(request_id: &str, value: Decimal) -> Result<Decimal, ApiError> {
    if value > Decimal::ZERO {
        Ok(value)
    } else {
        Err(ApiError::validation(
            request_id,
            format!("'quantity' must be greater than zero, got {value}"),
        ))
    }
}

/// Parse one of the domain enums, reporting the field name on failure.
pub(super) fn parse_choice<T>(request_id: &str, field: &str, value: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ApiError::validation(request_id, format!("'{field}': {e}")))
}

/// Latitude and longitude must be given together and lie in range.
pub(super) fn validate_coordinates(
    request_id: &str,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
) -> Result<(), ApiError> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => {
            if lat.abs() > Decimal::from(90) || lng.abs() > Decimal::from(180) {
                Err(ApiError::validation(
                    request_id,
                    "latitude must be within [-90, 90] and longitude within [-180, 180]",
                ))
            } else {
                Ok(())
            }
        }
        _ => Err(ApiError::validation(
            request_id,
            "latitude and longitude must be provided together",
        )),
    }
}
