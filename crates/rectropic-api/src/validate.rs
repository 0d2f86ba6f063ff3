//! Request field checks. Everything here runs before any store access.

use url::Url;

use crate::error::ApiError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_NAME_CHARS: usize = 100;

/// A list title: trimmed, 1..=200 characters.
pub fn list_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::invalid("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::invalid(format!("title exceeds {MAX_TITLE_CHARS} characters")));
    }
    Ok(title.to_string())
}

/// An optional content title: at most 200 characters, blank means none.
pub fn content_title(raw: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(title) = blank_to_none(raw) else {
        return Ok(None);
    };
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::invalid(format!("title exceeds {MAX_TITLE_CHARS} characters")));
    }
    Ok(Some(title))
}

pub fn display_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::invalid(format!("name must be 1..={MAX_NAME_CHARS} characters")));
    }
    Ok(name.to_string())
}

/// Absolute http(s) URL.
pub fn web_url(field: &str, raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| ApiError::invalid(format!("{field}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        _ => Err(ApiError::invalid(format!("{field} must be an http(s) URL"))),
    }
}

pub fn email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(ApiError::invalid("email is not a valid address"))
    }
}

pub fn blank_to_none(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
