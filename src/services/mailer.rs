//! Email transport adapter
//!
//! Thin HTTP client for the transactional mail provider; mock mode when
//! no provider is configured. The transport itself does no retrying:
//! retry policy for failed deliveries lives with the dispatch facility.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Mutex,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Connection settings for the mail provider.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub base_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// A send recorded by the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSend {
    pub to: Vec<String>,
    pub subject: String,
}

struct Mock {
    counter: AtomicI64,
    sends: Mutex<Vec<MockSend>>,
    fail: bool,
}

enum Inner {
    Http {
        config: MailerConfig,
        client: reqwest::Client,
    },
    Mock(Mock),
}

/// Client for the email transport.
pub struct Mailer {
    inner: Inner,
}

impl Mailer {
    /// Builds a mailer from an optional provider configuration.
    ///
    /// `None` activates mock mode.
    #[must_use]
    pub fn from_config(config: Option<MailerConfig>) -> Self {
        match config {
            Some(config) => {
                info!("Mail transport configured: {}", config.base_url);
                Self {
                    inner: Inner::Http {
                        config,
                        client: reqwest::Client::new(),
                    },
                }
            }
            None => {
                warn!("No mail transport configured, using mock mode");
                Self::mock_inner(false)
            }
        }
    }

    fn mock_inner(fail: bool) -> Self {
        Self {
            inner: Inner::Mock(Mock {
                counter: AtomicI64::new(0),
                sends: Mutex::new(Vec::new()),
                fail,
            }),
        }
    }

    /// Mock transport recording every send.
    #[cfg(test)]
    #[must_use]
    pub fn mock() -> Self {
        Self::mock_inner(false)
    }

    /// Mock transport where every send fails.
    #[cfg(test)]
    #[must_use]
    pub fn failing_mock() -> Self {
        Self::mock_inner(true)
    }

    /// Sends an email and returns the provider's delivery reference.
    pub async fn send(&self, to: &[String], subject: &str, html: &str) -> AppResult<String> {
        match &self.inner {
            Inner::Http { config, client } => {
                let body = SendBody {
                    from: &config.from,
                    to,
                    subject,
                    html,
                };

                let response = client
                    .post(format!("{}/emails", config.base_url))
                    .bearer_auth(&config.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AppError::Delivery(format!("send request failed: {e}")))?;

                if !response.status().is_success() {
                    return Err(AppError::Delivery(format!(
                        "send rejected with status {}",
                        response.status()
                    )));
                }

                let parsed: SendResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Delivery(format!("invalid send response: {e}")))?;

                debug!("Sent email to {to:?}: {}", parsed.id);
                Ok(parsed.id)
            }
            Inner::Mock(mock) => {
                if mock.fail {
                    return Err(AppError::Delivery("mock transport failure".to_string()));
                }

                let n = mock.counter.fetch_add(1, Ordering::AcqRel) + 1;
                let delivery_ref = format!("mock-mail-{n}");
                debug!("Mock send to {to:?}: {delivery_ref}");
                if let Ok(mut sends) = mock.sends.lock() {
                    sends.push(MockSend {
                        to: to.to_vec(),
                        subject: subject.to_string(),
                    });
                }
                Ok(delivery_ref)
            }
        }
    }

    /// Every send the mock transport has seen, in order.
    #[cfg(test)]
    #[must_use]
    pub fn recorded_sends(&self) -> Vec<MockSend> {
        match &self.inner {
            Inner::Mock(mock) => mock.sends.lock().map(|s| s.clone()).unwrap_or_default(),
            Inner::Http { .. } => Vec::new(),
        }
    }
}
