//! # Authenticated HTTP client shared by the services.
//!
//! Every request carries `Authorization: Bearer <access_token>` and
//! `Client-ID: <client_id>`. Requests with a body also carry
//! `Content-Type: application/json` and `Signature: <base64 RSA/SHA-256 of the body>`.
//!
//! Each send races against the cycle token, so an interruptible shutdown does
//! not wait on a slow service. A request that outlives its timeout fails with
//! [`TaskError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, TaskError};
use crate::security::{PayloadSigner, SecurityContext};

const USER_AGENT: &str = concat!("iq-agent/", env!("CARGO_PKG_VERSION"));
const CLIENT_ID_HEADER: &str = "Client-ID";
const SIGNATURE_HEADER: &str = "Signature";
/// Longest response excerpt copied into an error.
const DETAIL_LIMIT: usize = 512;

/// Signed client bound to one service URL.
#[derive(Clone)]
pub struct ServiceClient {
    http: Client,
    url: String,
    security: Arc<SecurityContext>,
    signer: PayloadSigner,
}

impl ServiceClient {
    /// Builds the client; fails if the client secret is not a usable key.
    pub fn new(
        service: &'static str,
        url: impl Into<String>,
        security: Arc<SecurityContext>,
    ) -> Result<Self, AgentError> {
        let signer = security.signer()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::Service {
                service,
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            url: url.into(),
            security,
            signer,
        })
    }

    /// Base URL of the service.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn authorized(&self, rb: RequestBuilder, timeout: Duration) -> RequestBuilder {
        let rb = rb
            .bearer_auth(self.security.access_token())
            .header(CLIENT_ID_HEADER, self.security.client_id());
        if timeout.is_zero() {
            rb
        } else {
            rb.timeout(timeout)
        }
    }

    /// `GET url` with the auth headers.
    pub async fn get(
        &self,
        ctx: &CancellationToken,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, TaskError> {
        let rb = self.authorized(self.http.get(url), timeout);
        send(ctx, rb, timeout).await
    }

    /// `POST url` with a signed JSON body.
    pub async fn post_signed<T: Serialize + ?Sized>(
        &self,
        ctx: &CancellationToken,
        url: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<Response, TaskError> {
        let payload = self.sign(body)?;
        self.post_payload(ctx, url, &payload, timeout).await
    }

    /// Same as [`post_signed`](Self::post_signed) with a pre-encoded body, so
    /// retries do not re-serialize or re-sign.
    pub async fn post_payload(
        &self,
        ctx: &CancellationToken,
        url: &str,
        payload: &SignedPayload,
        timeout: Duration,
    ) -> Result<Response, TaskError> {
        let rb = self
            .authorized(self.http.post(url), timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, payload.signature.as_str())
            .body(payload.body.clone());
        send(ctx, rb, timeout).await
    }

    /// Serializes and signs `body` once.
    pub fn sign<T: Serialize + ?Sized>(&self, body: &T) -> Result<SignedPayload, TaskError> {
        let body = serde_json::to_vec(body)?;
        let signature = self.signer.sign(&body);
        Ok(SignedPayload { body, signature })
    }
}

/// JSON body plus its signature.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    pub body: Vec<u8>,
    pub signature: String,
}

async fn send(
    ctx: &CancellationToken,
    rb: RequestBuilder,
    timeout: Duration,
) -> Result<Response, TaskError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        res = rb.send() => res.map_err(|e| {
            if e.is_timeout() {
                TaskError::Timeout { timeout }
            } else {
                TaskError::from(e)
            }
        }),
    }
}

/// Fails unless the response status is `expected`.
pub async fn expect_status(
    resp: Response,
    expected: StatusCode,
    what: &str,
) -> Result<Response, TaskError> {
    if resp.status() == expected {
        return Ok(resp);
    }
    let status = resp.status();
    let detail = resp.text().await.unwrap_or_default();
    Err(TaskError::fail(format!(
        "{what}: HTTP {status}: {}",
        excerpt(&detail)
    )))
}

fn excerpt(body: &str) -> &str {
    let body = body.trim();
    if body.len() <= DETAIL_LIMIT {
        return body;
    }
    let mut end = DETAIL_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
