//! Domain-specific shared validations and formatting utilities

use crate::errors::AppError;

pub const MAX_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_QUERY_LENGTH: usize = 512;

pub fn normalize_query(query: String) -> Result<String, AppError> {
    let normalized = query.trim();
    if normalized.is_empty() {
        return Err(AppError::bad_request(
            "invalid_query",
            "query must not be empty",
        ));
    }

    if normalized.len() > MAX_QUERY_LENGTH {
        return Err(AppError::bad_request(
            "invalid_query",
            "query must be at most 512 characters",
        ));
    }

    Ok(normalized.to_string())
}

pub fn normalize_search_limit(limit: Option<u32>) -> Result<usize, AppError> {
    let Some(value) = limit else {
        return Ok(DEFAULT_SEARCH_LIMIT);
    };

    let value = value as usize;
    if value == 0 || value > MAX_SEARCH_LIMIT {
        return Err(AppError::bad_request(
            "invalid_limit",
            "max_results must be between 1 and 50",
        ));
    }

    Ok(value)
}

pub fn normalize_provider_id(provider: Option<String>) -> Option<String> {
    provider
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

pub fn normalize_language(language: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = language else {
        return Ok(None);
    };

    let normalized = value.trim().to_string();
    if normalized.is_empty() {
        return Ok(None);
    }

    let valid_shape = normalized.len() >= 2
        && normalized.len() <= 10
        && normalized
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-');
    if !valid_shape {
        return Err(AppError::bad_request(
            "invalid_language",
            "language must be a short tag such as en or en-US",
        ));
    }

    Ok(Some(normalized))
}
