//! Delayed-message dispatch facility adapter
//!
//! The facility is an opaque at-least-once deliverer reached over HTTP.
//! Without a configured facility (local/dev) the client runs in mock
//! mode: enqueue hands out tagged handles and cancel/reschedule are
//! logged no-ops, so the rest of the pipeline is exercised identically.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Mutex,
};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::MIN_DISPATCH_DELAY_SECS;
use crate::error::{AppError, AppResult};

/// Connection settings for the external facility.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub base_url: String,
    pub token: String,
    pub callback_url: String,
}

/// Message body handed to the facility.
///
/// Carries only identifiers, never recipient PII: the delivery callback
/// re-resolves current data instead of trusting stale payload contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub notification_id: i64,
    pub kind: String,
    pub entity_id: i64,
}

#[derive(Debug, Serialize)]
struct EnqueueBody<'a> {
    payload: &'a DispatchPayload,
    delay_secs: i64,
    dedup_key: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct EnqueueResponse {
    handle: String,
}

/// Call record kept by the mock adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Enqueue { dedup_key: String, handle: String },
    Cancel { handle: String },
}

struct Mock {
    counter: AtomicI64,
    calls: Mutex<Vec<MockCall>>,
    /// 1-based enqueue call number that should fail (test aid)
    fail_on_enqueue: Option<u32>,
}

enum Inner {
    Http {
        config: DispatchConfig,
        client: reqwest::Client,
    },
    Mock(Mock),
}

/// Client for the delayed-message facility.
pub struct DispatchClient {
    inner: Inner,
}

/// Seconds from now until `deliver_at`, clamped to the facility minimum.
fn delay_secs(deliver_at: DateTime<Utc>) -> i64 {
    (deliver_at - Utc::now())
        .num_seconds()
        .max(MIN_DISPATCH_DELAY_SECS)
}

#[allow(clippy::cast_possible_truncation)]
fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl DispatchClient {
    /// Builds a client from an optional facility configuration.
    ///
    /// `None` activates mock mode.
    #[must_use]
    pub fn from_config(config: Option<DispatchConfig>) -> Self {
        match config {
            Some(config) => {
                info!("Dispatch client configured: {}", config.base_url);
                Self {
                    inner: Inner::Http {
                        config,
                        client: reqwest::Client::new(),
                    },
                }
            }
            None => {
                warn!("No dispatch facility configured, using mock mode");
                Self::mock_inner(None)
            }
        }
    }

    fn mock_inner(fail_on_enqueue: Option<u32>) -> Self {
        Self {
            inner: Inner::Mock(Mock {
                counter: AtomicI64::new(0),
                calls: Mutex::new(Vec::new()),
                fail_on_enqueue,
            }),
        }
    }

    /// Mock client recording every call.
    #[cfg(test)]
    #[must_use]
    pub fn mock() -> Self {
        Self::mock_inner(None)
    }

    /// Mock client whose `n`-th enqueue call (1-based) fails.
    #[cfg(test)]
    #[must_use]
    pub fn failing_mock(fail_on: u32) -> Self {
        Self::mock_inner(Some(fail_on))
    }

    /// Enqueues a delayed message and returns the facility's handle.
    pub async fn enqueue(
        &self,
        payload: &DispatchPayload,
        deliver_at: DateTime<Utc>,
        dedup_key: &str,
    ) -> AppResult<String> {
        let delay = delay_secs(deliver_at);

        match &self.inner {
            Inner::Http { config, client } => {
                let body = EnqueueBody {
                    payload,
                    delay_secs: delay,
                    dedup_key,
                    callback_url: &config.callback_url,
                };

                let response = client
                    .post(format!("{}/v1/messages", config.base_url))
                    .bearer_auth(&config.token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AppError::Dispatch(format!("enqueue request failed: {e}")))?;

                if !response.status().is_success() {
                    return Err(AppError::Dispatch(format!(
                        "enqueue rejected with status {}",
                        response.status()
                    )));
                }

                let parsed: EnqueueResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Dispatch(format!("invalid enqueue response: {e}")))?;

                debug!(
                    "Enqueued notification {} with delay {delay}s: {}",
                    payload.notification_id, parsed.handle
                );
                Ok(parsed.handle)
            }
            Inner::Mock(mock) => {
                let n = mock.counter.fetch_add(1, Ordering::AcqRel) + 1;
                if mock.fail_on_enqueue.is_some_and(|k| i64::from(k) == n) {
                    return Err(AppError::Dispatch(format!(
                        "mock enqueue failure injected at call {n}"
                    )));
                }

                let handle = format!("mock-{n}-{}", current_time_ms());
                debug!(
                    "Mock enqueue for notification {} (delay {delay}s): {handle}",
                    payload.notification_id
                );
                if let Ok(mut calls) = mock.calls.lock() {
                    calls.push(MockCall::Enqueue {
                        dedup_key: dedup_key.to_string(),
                        handle: handle.clone(),
                    });
                }
                Ok(handle)
            }
        }
    }

    /// Cancels a not-yet-delivered message. Best effort: a handle the
    /// facility no longer recognizes is an expected race, and transport
    /// failures are logged rather than surfaced.
    pub async fn cancel(&self, handle: &str) {
        match &self.inner {
            Inner::Http { config, client } => {
                let result = client
                    .delete(format!("{}/v1/messages/{handle}", config.base_url))
                    .bearer_auth(&config.token)
                    .send()
                    .await;

                match result {
                    Ok(response) if response.status().is_success() => {
                        debug!("Cancelled dispatch handle {handle}");
                    }
                    Ok(response) => {
                        // Already delivered or expired
                        debug!(
                            "Dispatch cancel for {handle} returned {}, ignoring",
                            response.status()
                        );
                    }
                    Err(e) => warn!("Dispatch cancel for {handle} failed: {e}"),
                }
            }
            Inner::Mock(mock) => {
                debug!("Mock cancel for handle {handle}");
                if let Ok(mut calls) = mock.calls.lock() {
                    calls.push(MockCall::Cancel {
                        handle: handle.to_string(),
                    });
                }
            }
        }
    }

    /// Replaces a message's delivery instant.
    ///
    /// The facility has no in-place reschedule, so this is a fresh
    /// enqueue followed by a best-effort cancel of the old handle; the
    /// returned handle becomes authoritative. The new message must exist
    /// before the old one is cancelled, otherwise a failed enqueue would
    /// leave a pending record with no live message behind it.
    pub async fn reschedule(
        &self,
        handle: &str,
        payload: &DispatchPayload,
        new_deliver_at: DateTime<Utc>,
        dedup_key: &str,
    ) -> AppResult<String> {
        let new_handle = self.enqueue(payload, new_deliver_at, dedup_key).await?;
        self.cancel(handle).await;
        Ok(new_handle)
    }

    /// Every call the mock adapter has seen, in order.
    #[cfg(test)]
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<MockCall> {
        match &self.inner {
            Inner::Mock(mock) => mock.calls.lock().map(|c| c.clone()).unwrap_or_default(),
            Inner::Http { .. } => Vec::new(),
        }
    }

    /// Handles enqueued by the mock adapter and not yet cancelled.
    #[cfg(test)]
    #[must_use]
    pub fn active_handles(&self) -> Vec<String> {
        let calls = self.recorded_calls();
        let mut active = Vec::new();
        for call in calls {
            match call {
                MockCall::Enqueue { handle, .. } => active.push(handle),
                MockCall::Cancel { handle } => active.retain(|h| h != &handle),
            }
        }
        active
    }
}
