//! JSON-over-HTTP plumbing shared by every outbound client.
//!
//! One POST per call, no retries.  The caller's [`Deadline`] bounds the whole
//! exchange and also becomes the request timeout, so the connection is torn
//! down when the budget runs out.

use mnemos_types::{Deadline, MnemosError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// POST `body` as JSON to `url` and parse a JSON reply.
///
/// `provider` labels errors and the deadline message.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
    provider: &str,
    deadline: Deadline,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    if deadline.is_expired() {
        return Err(MnemosError::DeadlineExceeded(provider.to_string()));
    }
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    if let Some(left) = deadline.remaining() {
        request = request.timeout(left);
    }
    debug!(provider, url, "POST");

    deadline
        .bound(provider, async move {
            let response = request.send().await.map_err(|e| transport(provider, e))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(upstream_error(provider, status, &text));
            }
            response
                .json::<R>()
                .await
                .map_err(|e| MnemosError::provider(provider, format!("unexpected response: {e}")))
        })
        .await
}

fn transport(provider: &str, e: reqwest::Error) -> MnemosError {
    if e.is_timeout() {
        MnemosError::DeadlineExceeded(provider.to_string())
    } else {
        MnemosError::provider(provider, e.to_string())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    error: T,
}

#[derive(Deserialize)]
struct UpstreamMessage {
    message: String,
}

/// Turn a non-success reply into an error.
///
/// A mnemos server answers `{"error": <MnemosError>}`, which is surfaced
/// unchanged.  OpenAI-compatible backends answer
/// `{"error": {"message": ...}}`; anything else is reported verbatim.
pub(crate) fn upstream_error(provider: &str, status: StatusCode, body: &str) -> MnemosError {
    if let Ok(Envelope { error }) = serde_json::from_str::<Envelope<MnemosError>>(body) {
        return error;
    }
    let message = match serde_json::from_str::<Envelope<UpstreamMessage>>(body) {
        Ok(Envelope { error }) => error.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    MnemosError::provider(provider, format!("HTTP {}: {message}", status.as_u16()))
}

/// `base` without trailing slashes, so paths can be appended with `/`.
pub(crate) fn trim_base(base: impl Into<String>) -> String {
    let mut base = base.into();
    while base.ends_with('/') {
        base.pop();
    }
    base
}
