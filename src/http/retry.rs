//! Retry classification for registry requests.

use reqwest::StatusCode;

/// Maximum number of attempts for a single registry request.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Errors that should not be retried.
#[derive(Debug)]
pub enum NonRetryableError {
    /// Rate limit exceeded (HTTP 429)
    RateLimitExceeded(String),
    /// Authentication failed (HTTP 401)
    AuthenticationFailed(String),
    /// Package or resource not found (HTTP 404)
    NotFound(String),
    /// Forbidden access (HTTP 403)
    Forbidden(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
}

impl NonRetryableError {
    /// HTTP status the registry answered with.
    pub fn status(&self) -> u16 {
        match self {
            NonRetryableError::RateLimitExceeded(_) => 429,
            NonRetryableError::AuthenticationFailed(_) => 401,
            NonRetryableError::NotFound(_) => 404,
            NonRetryableError::Forbidden(_) => 403,
            NonRetryableError::ClientError(msg) => msg
                .strip_prefix("HTTP ")
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse().ok())
                .unwrap_or(400),
        }
    }
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::RateLimitExceeded(msg) => {
                write!(
                    f,
                    "Rate limit exceeded: {}. Lower the number of workers or try again later.",
                    msg
                )
            }
            NonRetryableError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            NonRetryableError::NotFound(msg) => {
                write!(f, "Not found: {}", msg)
            }
            NonRetryableError::Forbidden(msg) => {
                write!(f, "Access forbidden: {}", msg)
            }
            NonRetryableError::ClientError(msg) => {
                write!(f, "Request error: {}", msg)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is retryable, Err with a user-friendly message if not.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    if let Some(status) = error.status() {
        match status {
            StatusCode::UNAUTHORIZED => {
                return Err(NonRetryableError::AuthenticationFailed(
                    "The registry requires authentication".to_string(),
                ));
            }
            StatusCode::FORBIDDEN => {
                return Err(NonRetryableError::Forbidden(
                    "Access to this resource is forbidden".to_string(),
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(NonRetryableError::RateLimitExceeded(
                    "Too many requests".to_string(),
                ));
            }
            StatusCode::NOT_FOUND => {
                return Err(NonRetryableError::NotFound(
                    "The requested package was not found".to_string(),
                ));
            }
            s if s.is_client_error() => {
                return Err(NonRetryableError::ClientError(format!(
                    "HTTP {} error",
                    s.as_u16()
                )));
            }
            // 5xx server errors are retryable
            _ => {}
        }
    }

    // Connection errors, timeouts, etc. are retryable
    Ok(())
}

/// Checks if an error from `error_for_status()` should be retried.
/// Returns the original error if retryable, or a user-friendly NonRetryableError if not.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_error(status: usize) -> reqwest::Error {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(status)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let response = client.get(server.url()).send().await.unwrap();
        response.error_for_status().unwrap_err()
    }

    #[test]
    fn test_non_retryable_error_display() {
        let err = NonRetryableError::RateLimitExceeded("test".to_string());
        assert!(err.to_string().contains("Rate limit"));
        assert!(err.to_string().contains("workers"));

        let err = NonRetryableError::NotFound("test".to_string());
        assert!(err.to_string().contains("Not found"));

        let err = NonRetryableError::ClientError("HTTP 400 error".to_string());
        assert!(err.to_string().contains("Request error"));
    }

    #[test]
    fn test_non_retryable_error_status() {
        assert_eq!(NonRetryableError::NotFound(String::new()).status(), 404);
        assert_eq!(
            NonRetryableError::ClientError("HTTP 410 error".to_string()).status(),
            410
        );
        assert_eq!(
            NonRetryableError::ClientError("garbage".to_string()).status(),
            400
        );
    }

    #[tokio::test]
    async fn test_classify_error_client_statuses() {
        let err = status_error(401).await;
        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::AuthenticationFailed(_))
        ));

        let err = status_error(403).await;
        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::Forbidden(_))
        ));

        let err = status_error(429).await;
        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::RateLimitExceeded(_))
        ));

        let err = status_error(404).await;
        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::NotFound(_))
        ));

        let err = status_error(400).await;
        assert!(matches!(
            classify_error(&err),
            Err(NonRetryableError::ClientError(_))
        ));
    }

    #[tokio::test]
    async fn test_classify_error_server_error_is_retryable() {
        let err = status_error(500).await;
        assert!(classify_error(&err).is_ok());
    }

    #[tokio::test]
    async fn test_check_retryable() {
        let err = status_error(404).await;
        assert!(check_retryable(err).downcast_ref::<NonRetryableError>().is_some());

        let err = status_error(503).await;
        assert!(check_retryable(err).downcast_ref::<NonRetryableError>().is_none());
    }
}
