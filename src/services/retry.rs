use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use color_eyre::Report;

use crate::spotify_rs::auth::RefreshTokenError;
use crate::spotify_rs::client::SpotifyApiError;

/// How often, and how patiently, a failed channel is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub min_delay: Duration,
}

impl RetrySettings {
    /// Delays to wait before each retry, growing exponentially.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.min_delay * 32)
            .with_max_times(self.max_retries)
            .build()
    }
}

/// Whether an error is transient: a timeout, a refused connection, a rate
/// limit or a server-side failure somewhere in the error chain.
pub fn is_retryable(error: &Report) -> bool {
    error.chain().any(|cause| {
        if let Some(api_error) = cause.downcast_ref::<SpotifyApiError>() {
            return api_error.is_retryable();
        }
        if let Some(refresh_error) = cause.downcast_ref::<RefreshTokenError>() {
            return refresh_error.is_retryable();
        }
        if let Some(http_error) = cause.downcast_ref::<reqwest::Error>() {
            return http_error.is_timeout()
                || http_error.is_connect()
                || http_error.status().is_some_and(|status| {
                    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                });
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::{WrapErr, eyre};
    use reqwest::StatusCode;

    #[test]
    fn test_rate_limit_is_retryable_through_context() {
        let error: Result<(), SpotifyApiError> =
            Err(SpotifyApiError::RateLimited { retry_after: None });
        let report = error.wrap_err("Failed to search albums").unwrap_err();

        assert!(is_retryable(&report));
    }

    #[test]
    fn test_client_errors_are_fatal() {
        let report = Report::new(SpotifyApiError::UnexpectedStatus {
            status: StatusCode::FORBIDDEN,
            body: "Insufficient client scope".to_string(),
        });

        assert!(!is_retryable(&report));
    }

    #[test]
    fn test_invalid_refresh_token_is_fatal() {
        let report = Report::new(RefreshTokenError::InvalidRefreshToken {
            reason: "invalid_grant".to_string(),
        });

        assert!(!is_retryable(&report));
    }

    #[test]
    fn test_token_endpoint_outage_is_retryable() {
        let error: Result<(), RefreshTokenError> = Err(RefreshTokenError::from_status(
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream connect error".to_string(),
        ));
        let report = error
            .wrap_err("Failed to refresh Spotify access token")
            .unwrap_err();

        assert!(is_retryable(&report));
    }

    #[test]
    fn test_plain_errors_are_fatal() {
        assert!(!is_retryable(&eyre!("Failed to parse song history")));
    }

    #[test]
    fn test_backoff_is_bounded_and_growing() {
        let settings = RetrySettings {
            max_retries: 3,
            min_delay: Duration::from_secs(1),
        };

        let delays: Vec<Duration> = settings.backoff().collect();
        assert_eq!(delays.len(), 3);
        assert_eq!(delays[0], Duration::from_secs(1));
        assert!(delays[1] > delays[0]);
        assert!(delays[2] > delays[1]);
    }
}
