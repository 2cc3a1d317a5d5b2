use crate::errors::AppError;
use crate::models::Notification;
use crate::storage::NotificationStore;
use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

type NotifyBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates the circuit breaker guarding webhook pushes.
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: exponential from 10s to 60s before attempting recovery.
///
/// While the circuit is open, notifications are still stored; only the push
/// is skipped.
fn create_notify_circuit_breaker() -> NotifyBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Client pushing notifications to the configured external webhook.
#[derive(Clone)]
pub struct NotifyClient {
    client: reqwest::Client,
    webhook_url: String,
    token: Option<String>,
    breaker: NotifyBreaker,
}

impl NotifyClient {
    pub fn new(webhook_url: String, token: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::NotifyError(format!("Failed to create notify client: {}", e)))?;

        Ok(Self {
            client,
            webhook_url,
            token,
            breaker: create_notify_circuit_breaker(),
        })
    }

    /// Push one notification through the circuit breaker.
    pub async fn push(&self, notification: &Notification) -> Result<(), AppError> {
        use failsafe::futures::CircuitBreaker;

        match self.breaker.call(self.post_notification(notification)).await {
            Ok(()) => Ok(()),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::NotifyError(
                "Webhook circuit open; push rejected".to_string(),
            )),
        }
    }

    async fn post_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let body = json!({
            "id": notification.id,
            "kind": notification.kind,
            "body": notification.body,
            "lead_id": notification.lead_id,
            "recipient_id": notification.recipient_id,
            "created_at": notification.created_at,
        });

        let mut request = self.client.post(&self.webhook_url).json(&body);
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::NotifyError(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::NotifyError(format!(
                "Webhook returned {}: {}",
                status, error_text
            )));
        }

        tracing::debug!("Notification {} pushed to webhook", notification.id);
        Ok(())
    }
}

/// Spawn a background notification job (non-blocking).
///
/// The spawned task:
/// 1. Stores the notification row
/// 2. Pushes it to the external webhook, when one is configured
///
/// Failures on either step are logged and never propagate to the request
/// that triggered the event.
pub fn spawn_notification_job(
    db: PgPool,
    notify_client: Option<NotifyClient>,
    kind: &'static str,
    body: String,
    recipient_id: Option<Uuid>,
    lead_id: Option<Uuid>,
) {
    tokio::spawn(async move {
        let store = NotificationStore::new(db);

        let notification = match store.insert(kind, &body, recipient_id, lead_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Failed to store {} notification: {}", kind, e);
                return;
            }
        };

        let Some(client) = notify_client else {
            return;
        };

        if let Err(e) = client.push(&notification).await {
            tracing::warn!(
                "Webhook push failed for notification {}: {}",
                notification.id,
                e
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn client_creation() {
        let client = NotifyClient::new("https://example.com/hook".to_string(), None);
        assert!(client.is_ok());
    }

    #[test]
    fn circuit_opens_after_consecutive_failures() {
        let cb = create_notify_circuit_breaker();

        // Simulate 5 consecutive failures
        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("simulated error"));
            assert!(result.is_err());
        }

        // Next call should be rejected (circuit is open)
        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));

        match result {
            Err(Error::Rejected) => {
                // Circuit is open, expected behavior
            }
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[test]
    fn circuit_allows_success() {
        let cb = create_notify_circuit_breaker();

        let result: Result<i32, Error<&str>> = cb.call(|| Ok::<i32, &str>(42));

        assert_eq!(result.unwrap(), 42);
    }
}
