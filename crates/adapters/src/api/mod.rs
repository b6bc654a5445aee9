// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane HTTP client.
//!
//! Single-shot requests with a 30-second deadline and no retries: the task
//! runtime's tickers provide the retry cadence, so hidden retries here
//! would only stack on top of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use pba_core::Config;
use pba_wire::{
    CertificateIssue, CompleteRequest, Envelope, FailRequest, HeartbeatAck, HeartbeatRequest,
    ProgressReport, TaskPage, TaskStatus, UpdateCheck,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Per-request deadline. Single attempt; recovery belongs to the callers.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport and protocol failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a well-formed envelope carrying
    /// `success=false`.
    #[error("API error: {message}")]
    Api { message: String, code: String },
    /// Non-2xx response without a parseable envelope.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse response: {source} (body: {body})")]
    Decode {
        source: serde_json::Error,
        body: String,
    },
    #[error("failed to read {path}: {source}")]
    Certificate {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Download {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// HTTP client for the control plane, in one of two authentication modes:
/// mTLS when the config names a full certificate triple, bearer-only
/// otherwise. The agent UUID rides along as a bearer token in both modes:
/// mTLS binds the identity, bearer permits bootstrap before issuance.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("phpborg-agent/", env!("CARGO_PKG_VERSION")));

        if config.use_tls() {
            // The client identity is presented to the server; the server's
            // own certificate is verified against the system trust store,
            // not the configured CA; that CA exists for the server to
            // verify us.
            let mut pem = read_pem(&config.tls.key_file)?;
            pem.extend(read_pem(&config.tls.cert_file)?);
            let identity = reqwest::Identity::from_pem(&pem)?;
            builder = builder.identity(identity);
        }

        if config.server.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.server.url.trim_end_matches('/').to_string(),
            bearer: config.agent.uuid.clone(),
        })
    }

    /// POST /agent/heartbeat: liveness plus capability refresh.
    pub async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<HeartbeatAck, ApiError> {
        self.request(Method::POST, "/agent/heartbeat", Some(request))
            .await
    }

    /// GET /agent/tasks: drain the ready queue.
    pub async fn fetch_tasks(&self) -> Result<TaskPage, ApiError> {
        self.request::<(), _>(Method::GET, "/agent/tasks", None)
            .await
    }

    /// POST /agent/tasks/{id}/start.
    pub async fn mark_started(&self, task_id: i64) -> Result<(), ApiError> {
        self.request_unit::<()>(Method::POST, &format!("/agent/tasks/{}/start", task_id), None)
            .await
    }

    /// POST /agent/tasks/{id}/progress.
    pub async fn report_progress(
        &self,
        task_id: i64,
        report: &ProgressReport,
    ) -> Result<(), ApiError> {
        self.request_unit(
            Method::POST,
            &format!("/agent/tasks/{}/progress", task_id),
            Some(report),
        )
        .await
    }

    /// GET /agent/tasks/{id}/status: cancellation check.
    pub async fn task_status(&self, task_id: i64) -> Result<TaskStatus, ApiError> {
        self.request::<(), _>(Method::GET, &format!("/agent/tasks/{}/status", task_id), None)
            .await
    }

    /// POST /agent/tasks/{id}/complete: terminal state.
    pub async fn complete(&self, task_id: i64, request: &CompleteRequest) -> Result<(), ApiError> {
        self.request_unit(
            Method::POST,
            &format!("/agent/tasks/{}/complete", task_id),
            Some(request),
        )
        .await
    }

    /// POST /agent/tasks/{id}/fail: terminal state.
    pub async fn fail(&self, task_id: i64, request: &FailRequest) -> Result<(), ApiError> {
        self.request_unit(
            Method::POST,
            &format!("/agent/tasks/{}/fail", task_id),
            Some(request),
        )
        .await
    }

    /// POST /agent/update/check: version negotiation.
    pub async fn check_update(&self, version: &str) -> Result<UpdateCheck, ApiError> {
        self.request(
            Method::POST,
            "/agent/update/check",
            Some(&serde_json::json!({ "version": version })),
        )
        .await
    }

    /// GET /agent/update/download: stream the new binary to `dest`.
    pub async fn download_update(&self, dest: &Path) -> Result<(), ApiError> {
        let url = format!("{}/agent/update/download", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.bearer)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let download_err = |source| ApiError::Download {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(download_err)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await.map_err(download_err)?;
        }
        file.flush().await.map_err(download_err)?;
        Ok(())
    }

    /// POST /agent/certificate/renew: obtain a fresh mTLS bundle.
    pub async fn renew_certificate(&self) -> Result<CertificateIssue, ApiError> {
        self.request::<(), _>(Method::POST, "/agent/certificate/renew", None)
            .await
    }

    async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.bearer)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(source) => {
                if !status.is_success() {
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                return Err(ApiError::Decode { source, body: text });
            }
        };

        if !envelope.success {
            let (message, code) = match envelope.error {
                Some(error) => (error.message, error.code),
                None => ("unknown error".to_string(), String::new()),
            };
            return Err(ApiError::Api { message, code });
        }

        // Some endpoints answer success with no data; let those decode as
        // empty objects rather than nulls.
        let data = if envelope.data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            envelope.data
        };
        serde_json::from_value(data).map_err(|source| ApiError::Decode { source, body: text })
    }

    async fn request_unit<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.request::<B, serde_json::Value>(method, path, body)
            .await
            .map(|_| ())
    }
}

fn read_pem(path: &str) -> Result<Vec<u8>, ApiError> {
    std::fs::read(path).map_err(|source| ApiError::Certificate {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
