//! Slack incoming-webhook dispatch.

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{info, instrument};

use crate::message::Message;

/// Errors from posting a message.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// HTTP transport failure.
    #[error("failed to reach Slack webhook: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The webhook answered with a non-success status.
    #[error("Slack webhook returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Result alias for dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Something that can deliver a composed message.
pub trait Dispatcher {
    /// Deliver `message`. Errors are never swallowed.
    fn post(&self, message: &Message) -> DispatchResult<()>;
}

/// A Slack incoming webhook.
#[derive(Clone)]
pub struct SlackWebhook {
    client: Client,
    url: String,
}

impl SlackWebhook {
    /// Create a dispatcher for the webhook at `url`.
    pub fn new(url: &str) -> DispatchResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Dispatcher for SlackWebhook {
    #[instrument(skip_all, fields(blocks = message.blocks.len()))]
    fn post(&self, message: &Message) -> DispatchResult<()> {
        let payload = message.to_json()?;
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), "message posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Block, Text, TextKind};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> Message {
        Message {
            blocks: vec![
                Block::Header {
                    text: Text {
                        kind: TextKind::PlainText,
                        text: "Billing API".to_string(),
                        emoji: Some(true),
                    },
                },
                Block::Divider,
            ],
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn posts_blocks_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T/B/X"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "blocks": [{"type": "header"}, {"type": "divider"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/services/T/B/X", server.uri());
        tokio::task::spawn_blocking(move || SlackWebhook::new(&url)?.post(&message()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_blocks"))
            .mount(&server)
            .await;

        let url = server.uri();
        let err = tokio::task::spawn_blocking(move || SlackWebhook::new(&url)?.post(&message()))
            .await
            .unwrap()
            .unwrap_err();

        match err {
            DispatchError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid_blocks");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn unreachable_webhook_is_an_error() {
        let webhook = SlackWebhook::new("http://127.0.0.1:9/hook").unwrap();
        let err = webhook.post(&message()).unwrap_err();
        assert!(matches!(err, DispatchError::Http(_)));
    }
}
