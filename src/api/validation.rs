use thiserror::Error;

use super::models::BatchRequest;
use crate::events::PlatformEvent;

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("cluster_token is required")]
    MissingClusterToken,
    #[error("category_id is required")]
    MissingCategory,
    #[error("urls must contain between 1 and {0} entries")]
    InvalidUrlCount(usize),
    #[error("url '{0}' must be an http/https url")]
    InvalidUrl(String),
    #[error("event uuid is required")]
    MissingEventId,
    #[error("event_type is required")]
    MissingEventType,
}

pub fn validate_batch(
    request: &BatchRequest,
    max_urls: usize,
) -> Result<(), RequestValidationError> {
    if request.cluster_token.trim().is_empty() {
        return Err(RequestValidationError::MissingClusterToken);
    }

    if request.category_id.trim().is_empty() {
        return Err(RequestValidationError::MissingCategory);
    }

    if !(1..=max_urls).contains(&request.urls.len()) {
        return Err(RequestValidationError::InvalidUrlCount(max_urls));
    }

    for url in &request.urls {
        let parsed = reqwest::Url::parse(url)
            .map_err(|_| RequestValidationError::InvalidUrl(url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RequestValidationError::InvalidUrl(url.clone()));
        }
    }

    Ok(())
}

pub fn validate_event(event: &PlatformEvent) -> Result<(), RequestValidationError> {
    if event.uuid.trim().is_empty() {
        return Err(RequestValidationError::MissingEventId);
    }
    if event.event_type.trim().is_empty() {
        return Err(RequestValidationError::MissingEventType);
    }
    Ok(())
}
