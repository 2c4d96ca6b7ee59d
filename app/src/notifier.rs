//! Notification adapters.
//!
//! The scheduler only emits intents. These adapters hand them to whatever
//! actually sends email or push messages.

use crate::config::NotifyConfig;
use chairbook_core::effect::NotificationIntent;
use chairbook_core::environment::{NotifyError, Notifier};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Writes every intent to the log and reports success.
///
/// Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, intent: NotificationIntent) -> NotifyFuture<'_> {
        Box::pin(async move {
            let booking = &intent.booking;
            tracing::info!(
                kind = intent.kind.as_str(),
                booking_id = %booking.id,
                shop_id = %booking.shop_id,
                status = booking.status.as_str(),
                client_email = %booking.client.email,
                time = %booking.time_label(),
                "Notification intent"
            );
            Ok(())
        })
    }
}

/// POSTs each intent as JSON to a webhook.
///
/// Server errors, throttling and transport failures are reported as
/// [`NotifyError::Transport`] so the dispatcher retries them. Any other
/// non-success status is a [`NotifyError::Rejected`].
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, intent: NotificationIntent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&intent)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, intent: NotificationIntent) -> NotifyFuture<'_> {
        Box::pin(self.post(intent))
    }
}

/// Map a failed webhook response onto [`NotifyError`].
fn classify(status: StatusCode, body: &str) -> NotifyError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        NotifyError::Transport(message)
    } else {
        NotifyError::Rejected(message)
    }
}

/// Pick the notifier the configuration asks for.
///
/// # Errors
///
/// Returns [`NotifyError::Transport`] if the webhook client cannot be built.
pub fn from_config(
    config: &NotifyConfig,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!(%url, "Delivering notifications to webhook");
            Ok(Arc::new(WebhookNotifier::new(url.clone(), timeout)?))
        },
        None => {
            tracing::info!("No webhook configured, notification intents will be logged");
            Ok(Arc::new(LoggingNotifier))
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert_eq!(
            classify(StatusCode::SERVICE_UNAVAILABLE, ""),
            NotifyError::Transport("503 Service Unavailable".to_string())
        );
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            NotifyError::Transport(message) if message.ends_with("slow down")
        ));
    }

    #[test]
    fn client_errors_are_rejections() {
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, "unknown template"),
            NotifyError::Rejected(_)
        ));
    }

    #[test]
    fn configuration_picks_the_adapter() {
        let logged = NotifyConfig {
            webhook_url: None,
            timeout_secs: 1,
            max_attempts: 1,
            initial_delay_ms: 1,
        };
        assert!(from_config(&logged, Duration::from_secs(1)).is_ok());

        let hooked = NotifyConfig {
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
            ..logged
        };
        assert!(from_config(&hooked, Duration::from_secs(1)).is_ok());
    }
}
