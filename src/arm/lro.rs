//! Polling of long-running resource manager operations.
//!
//! A mutating call is answered either with a final resource, or with an
//! `Azure-AsyncOperation` status URL, or with a `Location` URL that keeps
//! returning 202 until the work is done. [`wait_until_done`] drives whichever
//! form the service chose to a terminal state.

use std::time::{Duration, Instant};

use reqwest::{header::HeaderMap, Response, StatusCode};
use serde_json::Value;

use crate::arm::{
    models::{provisioning_state_of, OperationStatus},
    ArmClient, ArmError,
};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const LOCATION_HEADER: &str = "location";
const RETRY_AFTER_HEADER: &str = "retry-after";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateOrUpdate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalStatus {
    Succeeded,
    Failed,
    Canceled,
}

pub(crate) fn classify_status(status: &str) -> Option<TerminalStatus> {
    if status.eq_ignore_ascii_case("succeeded") {
        Some(TerminalStatus::Succeeded)
    } else if status.eq_ignore_ascii_case("failed") {
        Some(TerminalStatus::Failed)
    } else if status.eq_ignore_ascii_case("canceled") || status.eq_ignore_ascii_case("cancelled")
    {
        Some(TerminalStatus::Canceled)
    } else {
        None
    }
}

struct Deadline {
    started: Instant,
    settings: PollSettings,
}

impl Deadline {
    fn new(settings: PollSettings) -> Self {
        Self {
            started: Instant::now(),
            settings,
        }
    }

    async fn pause(&self, headers: &HeaderMap) -> Result<(), ArmError> {
        let delay = retry_after(headers).unwrap_or(self.settings.interval);
        if let Some(timeout) = self.settings.timeout {
            if self.started.elapsed() + delay > timeout {
                return Err(ArmError::Timeout(timeout));
            }
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Waits for the operation started by `initial` and returns the final
/// resource body for create-or-update calls, `None` for deletes.
pub(crate) async fn wait_until_done(
    client: &ArmClient,
    initial: Response,
    resource_url: &str,
    kind: OperationKind,
) -> Result<Option<Value>, ArmError> {
    let deadline = Deadline::new(client.poll_settings());
    let status = initial.status();
    let headers = initial.headers().clone();
    let body = read_json(initial).await?;

    if let Some(operation_url) = header_value(&headers, ASYNC_OPERATION_HEADER) {
        tracing::debug!(%operation_url, "polling async operation status");
        poll_async_operation(client, &operation_url, &headers, &deadline).await?;
        return match kind {
            OperationKind::CreateOrUpdate => fetch_resource(client, resource_url).await.map(Some),
            OperationKind::Delete => Ok(None),
        };
    }

    if status == StatusCode::ACCEPTED {
        let Some(location) = header_value(&headers, LOCATION_HEADER) else {
            return match kind {
                OperationKind::Delete => Ok(None),
                OperationKind::CreateOrUpdate => Err(ArmError::InvalidResponse(
                    "202 Accepted without a polling URL".to_owned(),
                )),
            };
        };
        tracing::debug!(%location, "polling operation location");
        let final_body = poll_location(client, &location, &headers, &deadline).await?;
        return match kind {
            OperationKind::Delete => Ok(None),
            OperationKind::CreateOrUpdate => match final_body {
                Some(body) if !body.is_null() => Ok(Some(body)),
                _ => fetch_resource(client, resource_url).await.map(Some),
            },
        };
    }

    match kind {
        OperationKind::Delete => Ok(None),
        OperationKind::CreateOrUpdate => {
            poll_provisioning_state(client, resource_url, body, &headers, &deadline)
                .await
                .map(Some)
        }
    }
}

async fn poll_async_operation(
    client: &ArmClient,
    operation_url: &str,
    initial_headers: &HeaderMap,
    deadline: &Deadline,
) -> Result<(), ArmError> {
    let mut headers = initial_headers.clone();
    loop {
        deadline.pause(&headers).await?;

        let response = client.get_absolute(operation_url).await?;
        headers = response.headers().clone();
        let operation: OperationStatus = response.json().await?;

        match classify_status(&operation.status) {
            Some(TerminalStatus::Succeeded) => return Ok(()),
            Some(TerminalStatus::Failed | TerminalStatus::Canceled) => {
                let error = operation.error.unwrap_or_default();
                return Err(ArmError::OperationFailed {
                    status: operation.status,
                    code: error.code_or_unknown(),
                    message: error.describe(),
                });
            }
            None => tracing::trace!(status = %operation.status, "operation still running"),
        }
    }
}

async fn poll_location(
    client: &ArmClient,
    location: &str,
    initial_headers: &HeaderMap,
    deadline: &Deadline,
) -> Result<Option<Value>, ArmError> {
    let mut headers = initial_headers.clone();
    loop {
        deadline.pause(&headers).await?;

        let response = client.get_absolute(location).await?;
        if response.status() != StatusCode::ACCEPTED {
            return read_json(response).await;
        }
        headers = response.headers().clone();
    }
}

async fn poll_provisioning_state(
    client: &ArmClient,
    resource_url: &str,
    mut body: Option<Value>,
    initial_headers: &HeaderMap,
    deadline: &Deadline,
) -> Result<Value, ArmError> {
    let mut headers = initial_headers.clone();
    loop {
        let current = match body.take() {
            Some(current) => current,
            None => fetch_resource(client, resource_url).await?,
        };

        let state = provisioning_state_of(&current).map(str::to_owned);
        match state.as_deref().map(classify_status) {
            None | Some(Some(TerminalStatus::Succeeded)) => return Ok(current),
            Some(Some(TerminalStatus::Failed | TerminalStatus::Canceled)) => {
                return Err(ArmError::OperationFailed {
                    status: state.unwrap_or_default(),
                    code: "ProvisioningFailed".to_owned(),
                    message: format!("resource at {resource_url} did not provision"),
                });
            }
            Some(None) => {
                tracing::trace!(state = ?state, "resource still provisioning");
                deadline.pause(&headers).await?;
                headers = HeaderMap::new();
            }
        }
    }
}

async fn fetch_resource(client: &ArmClient, resource_url: &str) -> Result<Value, ArmError> {
    let response = client.get_absolute(resource_url).await?;
    read_json(response)
        .await?
        .ok_or_else(|| ArmError::InvalidResponse(format!("empty resource body from {resource_url}")))
}

async fn read_json(response: Response) -> Result<Option<Value>, ArmError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|error| ArmError::InvalidResponse(format!("body is not JSON: {error}")))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_value(headers, RETRY_AFTER_HEADER)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .filter(|delay| *delay <= MAX_RETRY_AFTER)
}
