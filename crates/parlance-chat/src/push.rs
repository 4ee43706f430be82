//! Best-effort push notifications for new messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ChatConfig;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One notification addressed to a device token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(&self, notification: &PushNotification) -> Result<(), PushError>;
}

/// Expo push service client.
pub struct ExpoPushNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    sound: &'static str,
    title: &'a str,
    body: &'a str,
    data: &'a Value,
}

#[async_trait]
impl PushNotifier for ExpoPushNotifier {
    async fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        let message = ExpoMessage {
            to: &notification.to,
            sound: "default",
            title: &notification.title,
            body: &notification.body,
            data: &notification.data,
        };
        self.client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Drops every notification.
pub struct NoopPushNotifier;

#[async_trait]
impl PushNotifier for NoopPushNotifier {
    async fn send(&self, _notification: &PushNotification) -> Result<(), PushError> {
        Ok(())
    }
}

pub fn notifier_from_config(config: &ChatConfig) -> Arc<dyn PushNotifier> {
    if config.push_enabled {
        Arc::new(ExpoPushNotifier::new(&config.push_url))
    } else {
        Arc::new(NoopPushNotifier)
    }
}

/// Send in the background.  Failures are logged and never reach the caller.
pub fn dispatch(notifier: Arc<dyn PushNotifier>, notification: PushNotification) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&notification).await {
            Ok(()) => debug!("Push notification sent"),
            Err(e) => warn!(error = %e, "Push notification failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> PushNotification {
        PushNotification {
            to: "ExponentPushToken[abc]".into(),
            title: "Alice".into(),
            body: "Hello".into(),
            data: serde_json::json!({ "chatRoomId": "r1" }),
        }
    }

    #[tokio::test]
    async fn test_expo_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/send"))
            .and(body_partial_json(serde_json::json!({
                "to": "ExponentPushToken[abc]",
                "sound": "default",
                "title": "Alice",
                "body": "Hello",
                "data": { "chatRoomId": "r1" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = ExpoPushNotifier::new(format!("{}/push/send", server.uri()));
        notifier.send(&notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier: Arc<dyn PushNotifier> = Arc::new(ExpoPushNotifier::new(server.uri()));
        assert!(notifier.send(&notification()).await.is_err());
        dispatch(notifier, notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_push_is_noop() {
        let config = ChatConfig {
            push_enabled: false,
            push_url: "http://127.0.0.1:9".into(),
            ..ChatConfig::default()
        };
        notifier_from_config(&config)
            .send(&notification())
            .await
            .unwrap();
    }
}
