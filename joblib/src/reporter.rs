//! Completion notification for the metadata service.

use crate::error::{Error, Result};
use crate::job::JobStatus;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use tracing::info;

/// Upper bound on one finalize request, connect through response.
pub const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Told exactly once about every job that succeeds.
#[async_trait]
pub trait CompletionReporter: Send + Sync {
    async fn report(&self, token: &str, data_type: &str, status: &JobStatus) -> Result<()>;
}

/// Posts finished jobs to `{server}/api/finalize`.
#[derive(Clone, Debug)]
pub struct FinalizeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FinalizeClient {
    /// `server` is `host:port` or a full base URL. Plain `host:port` is reached over http.
    ///
    /// A request that takes longer than `timeout` fails with [`Error::Report`].
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Report(err.to_string()))?;
        Ok(Self::with_client(http, server))
    }

    pub fn with_client(http: reqwest::Client, server: &str) -> Self {
        let base = server.trim_end_matches('/');
        let endpoint = if base.contains("://") {
            format!("{base}/api/finalize")
        } else {
            format!("http://{base}/api/finalize")
        };
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionReporter for FinalizeClient {
    async fn report(&self, token: &str, data_type: &str, status: &JobStatus) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, token)
            .query(&[("data_type", data_type)])
            .json(status)
            .send()
            .await
            .map_err(|err| Error::Report(err.to_string()))?;
        let code = response.status();
        info!(job_id = status.id, status = %code, "finalize request sent");
        if code.is_success() {
            Ok(())
        } else {
            Err(Error::Report(format!(
                "{} answered {code}",
                self.endpoint
            )))
        }
    }
}
