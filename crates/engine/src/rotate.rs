// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Certificate rotator: keeps the mTLS client identity valid.
//!
//! Checks the client certificate's expiry daily and renews when it is
//! within 30 days. New files are installed with a temp-file-and-rename
//! sequence in the target directory, so the on-disk triple is always one
//! consistent generation. The transport is not rebuilt mid-run; renewed
//! certificates take effect on the next process start.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use pba_adapters::{ApiClient, ApiError};
use pba_core::Config;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Days before expiry at which renewal starts.
pub const RENEWAL_THRESHOLD_DAYS: i64 = 30;

/// How often the expiry is checked.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse certificate: {0}")]
    Parse(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to decode renewed bundle: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Background activity owning the three certificate files. Single writer:
/// exactly one rotator runs per process.
pub struct CertRotator {
    client: Arc<ApiClient>,
    config: Arc<Config>,
}

impl CertRotator {
    pub fn new(client: Arc<ApiClient>, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Immediate check on start, then one per day until shutdown.
    pub async fn run(&self, shutdown: CancellationToken) {
        if !self.config.use_tls() {
            tracing::info!("mTLS not configured, certificate rotation disabled");
            return;
        }

        self.check_and_renew().await;

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + CHECK_INTERVAL,
            CHECK_INTERVAL,
        );
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => self.check_and_renew().await,
            }
        }
    }

    async fn check_and_renew(&self) {
        let expiry = match certificate_expiry(Path::new(&self.config.tls.cert_file)) {
            Ok(expiry) => expiry,
            Err(error) => {
                tracing::warn!(%error, "failed to check certificate expiry");
                return;
            }
        };

        let now = Utc::now();
        tracing::info!(expires_at = %expiry.to_rfc3339(), "certificate expiry checked");
        if !should_renew(expiry, now) {
            tracing::debug!("certificate valid beyond renewal threshold");
            return;
        }

        tracing::info!("certificate expires within 30 days, renewing");
        match self.renew().await {
            Ok(expires_at) => {
                tracing::info!(new_expiry = %expires_at, "certificate renewed");
            }
            Err(error) => {
                tracing::warn!(%error, "certificate renewal failed");
            }
        }
    }

    /// Fetch a new bundle, back up the current one, install atomically.
    pub async fn renew(&self) -> Result<String, RotateError> {
        let issue = self.client.renew_certificate().await?;

        let engine = base64::engine::general_purpose::STANDARD;
        let cert = engine.decode(issue.cert.trim())?;
        let key = engine.decode(issue.key.trim())?;
        let ca = engine.decode(issue.ca.trim())?;

        self.backup_current();

        write_atomic(Path::new(&self.config.tls.cert_file), &cert, 0o644)?;
        write_atomic(Path::new(&self.config.tls.key_file), &key, 0o600)?;
        write_atomic(Path::new(&self.config.tls.ca_file), &ca, 0o644)?;

        Ok(issue.expires_at)
    }

    /// Timestamped backup of the current cert and key into a `backup/`
    /// sibling directory. Best-effort: a failed backup never blocks the
    /// renewal itself.
    fn backup_current(&self) {
        let cert_file = Path::new(&self.config.tls.cert_file);
        let Some(dir) = cert_file.parent() else {
            return;
        };
        let backup_dir = dir.join("backup");
        if let Err(error) = std::fs::create_dir_all(&backup_dir) {
            tracing::warn!(%error, "failed to create certificate backup directory");
            return;
        }

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let copies = [
            (
                cert_file.to_path_buf(),
                backup_dir.join(format!("agent-{}.crt", timestamp)),
            ),
            (
                PathBuf::from(&self.config.tls.key_file),
                backup_dir.join(format!("agent-{}.key", timestamp)),
            ),
        ];
        for (source, dest) in copies {
            if let Err(error) = std::fs::copy(&source, &dest) {
                tracing::warn!(source = %source.display(), %error, "failed to back up certificate file");
            }
        }
    }
}

/// `NotAfter` of the PEM certificate at `path`.
pub fn certificate_expiry(path: &Path) -> Result<DateTime<Utc>, RotateError> {
    let pem_bytes = std::fs::read(path).map_err(|source| RotateError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (_, pem) = x509_parser::pem::parse_x509_pem(&pem_bytes)
        .map_err(|error| RotateError::Parse(error.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|error| RotateError::Parse(error.to_string()))?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| RotateError::Parse("certificate expiry out of range".to_string()))
}

/// True once the expiry is within the renewal threshold.
pub fn should_renew(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiry - now <= chrono::Duration::days(RENEWAL_THRESHOLD_DAYS)
}

/// Write via a temp file in the target's directory, then rename into
/// place. The rename keeps readers from ever seeing a half-written file.
fn write_atomic(path: &Path, data: &[u8], mode: u32) -> Result<(), RotateError> {
    let write_err = |source| RotateError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;

    use std::io::Write as _;
    temp.write_all(data).map_err(write_err)?;
    temp.flush().map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
    }

    temp.persist(path)
        .map_err(|error| write_err(error.error))?;
    Ok(())
}

#[cfg(test)]
#[path = "rotate_tests.rs"]
mod tests;
