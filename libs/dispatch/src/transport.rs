//! Outbound webhook transport.

use std::time::Duration;

use async_trait::async_trait;
use relay_events::EventEnvelope;
use reqwest::StatusCode;

use crate::{DeliveryError, Subscriber};

/// The seam between the dispatcher and the network.
///
/// A send either succeeds (endpoint acknowledged with a 2xx) or fails with a
/// classified [`DeliveryError`]. Tests substitute their own transports to
/// exercise the retry machinery without a network.
#[async_trait]
pub trait EndpointTransport: Send + Sync {
    /// Delivers one event to one subscriber endpoint.
    async fn deliver(
        &self,
        subscriber: &Subscriber,
        event: &EventEnvelope,
    ) -> Result<(), DeliveryError>;
}

/// HTTP transport: POSTs the serialized envelope to the subscriber endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

#[async_trait]
impl EndpointTransport for HttpTransport {
    async fn deliver(
        &self,
        subscriber: &Subscriber,
        event: &EventEnvelope,
    ) -> Result<(), DeliveryError> {
        let url = reqwest::Url::parse(&subscriber.endpoint).map_err(|e| {
            DeliveryError::Permanent(format!(
                "malformed endpoint '{}': {}",
                subscriber.endpoint, e
            ))
        })?;

        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(classify_status(status))
    }
}

fn classify_request_error(err: reqwest::Error) -> DeliveryError {
    if err.is_builder() {
        DeliveryError::Permanent(err.to_string())
    } else {
        // Timeouts, connection resets, and refused connections are all
        // worth retrying.
        DeliveryError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode) -> DeliveryError {
    let retryable = status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS;

    if retryable {
        DeliveryError::Transient(format!("endpoint returned {}", status))
    } else {
        DeliveryError::Permanent(format!("endpoint returned {}", status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
    }

    #[test]
    fn test_throttling_and_timeout_are_transient() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!classify_status(StatusCode::BAD_REQUEST).is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND).is_transient());
        assert!(!classify_status(StatusCode::GONE).is_transient());
    }
}
