use crate::server::response::{
    ApiError, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_FILE_NAME_LEN: usize = 255;
const MAX_METADATA_KEY_LEN: usize = 128;
const MAX_TAG_LEN: usize = 64;
pub const MAX_LINK_TTL_HOURS: i64 = 168; // 7 days
pub const DEFAULT_LINK_TTL_HOURS: i64 = 24;

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::bad_request("Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_file_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("File name cannot be empty"));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "File name cannot exceed {MAX_FILE_NAME_LEN} characters"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ApiError::bad_request(
            "File name cannot contain path separators",
        ));
    }
    Ok(())
}

pub fn validate_metadata_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::bad_request("Metadata key cannot be empty"));
    }
    if key.len() > MAX_METADATA_KEY_LEN {
        return Err(ApiError::bad_request(format!(
            "Metadata key cannot exceed {MAX_METADATA_KEY_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<(), ApiError> {
    for tag in tags {
        if tag.is_empty() {
            return Err(ApiError::bad_request("Tags cannot be empty"));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(ApiError::bad_request(format!(
                "Tags cannot exceed {MAX_TAG_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Link TTLs must be positive and are capped at 7 days.
pub fn validate_link_ttl(hours: i64) -> Result<(), ApiError> {
    if hours < 1 || hours > MAX_LINK_TTL_HOURS {
        return Err(ApiError::bad_request(format!(
            "expires_in_hours must be between 1 and {MAX_LINK_TTL_HOURS}"
        )));
    }
    Ok(())
}

/// Normalizes optional page/limit query values, rejecting out-of-range input.
pub fn validate_pagination(
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<(i64, i64), ApiError> {
    let page = page.unwrap_or(DEFAULT_PAGE);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

    if page < 1 {
        return Err(ApiError::bad_request("page must be a positive integer"));
    }
    if limit < 1 || limit > MAX_PAGE_SIZE {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok((page, limit))
}
