//! HTTP client for the job status and artifact endpoints
//!
//! The dispatcher and poller talk to the server through the [`JobsApi`] trait
//! so tests and alternative transports can be injected. [`HttpJobsApi`] is the
//! production implementation over `reqwest`, following the backend's routes:
//!
//! - `GET {base_url}/jobs/{id}/status` — job status snapshot
//! - `GET {base_url}/downloads/{id}` — artifact bytes, with an optional
//!   `Content-Disposition` filename
//!
//! A 404 from either endpoint maps to [`Error::JobNotFound`]: the job has not
//! materialized server-side yet, which is an expected condition during the
//! first polling ticks, not a failure.

use crate::config::ApiConfig;
use crate::delivery::disposition_filename;
use crate::error::{Error, Result};
use crate::types::{Artifact, JobId, JobStatusSnapshot};
use async_trait::async_trait;
use serde::Deserialize;

/// Operations the dispatcher needs from the artifact/status API
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Query the current status of a job
    async fn job_status(&self, id: &JobId) -> Result<JobStatusSnapshot>;

    /// Fetch the binary artifact produced by a successfully completed job
    async fn fetch_artifact(&self, id: &JobId) -> Result<Artifact>;
}

/// `JobsApi` implementation over HTTP
#[derive(Debug)]
pub struct HttpJobsApi {
    client: reqwest::Client,
    base_url: String,
    auth_header: Option<String>,
}

/// Error body shape the backend uses for non-success responses
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpJobsApi {
    /// Create a client from the API configuration
    ///
    /// Validates the base URL up front so a typo fails at construction rather
    /// than on the first poll.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        url::Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", config.base_url, e),
            key: Some("api.base_url".to_string()),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: config.auth_header.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }
        request
    }

    /// Turn a non-success response into the matching error
    ///
    /// Prefers the backend's `{"error": "..."}` body for the message; falls
    /// back to the raw body text.
    async fn error_for(id: &JobId, response: reqwest::Response) -> Error {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Error::JobNotFound(id.to_string());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn job_status(&self, id: &JobId) -> Result<JobStatusSnapshot> {
        let response = self.get(&format!("/jobs/{}/status", id)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(id, response).await);
        }
        Ok(response.json().await?)
    }

    async fn fetch_artifact(&self, id: &JobId) -> Result<Artifact> {
        let response = self.get(&format!("/downloads/{}", id)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(id, response).await);
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);

        let data = response.bytes().await?.to_vec();
        Ok(Artifact { data, filename })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_config(server: &MockServer) -> ApiConfig {
        ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        };
        let err = HttpJobsApi::new(&config).unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "api.base_url"));
    }

    #[tokio::test]
    async fn job_status_parses_a_progress_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/t1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "t1",
                "status": "PROGRESS",
                "progress": {"current": 4, "total": 8, "percent": 50.0}
            })))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let snap = api.job_status(&JobId::new("t1")).await.unwrap();
        assert_eq!(snap.status, JobStatus::Progress);
        assert_eq!(snap.progress.unwrap().current, 4);
    }

    #[tokio::test]
    async fn job_status_maps_404_to_job_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/t1/status"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let err = api.job_status(&JobId::new("t1")).await.unwrap_err();
        assert!(err.is_not_found(), "404 must map to the silent retry path");
    }

    #[tokio::test]
    async fn job_status_maps_other_failures_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/t1/status"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "broker offline"})),
            )
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let err = api.job_status(&JobId::new("t1")).await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "broker offline");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_artifact_returns_bytes_and_disposition_filename() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/downloads/t1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"PK\x03\x04".to_vec())
                    .insert_header("Content-Disposition", "attachment; filename=\"reporte.zip\""),
            )
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let artifact = api.fetch_artifact(&JobId::new("t1")).await.unwrap();
        assert_eq!(artifact.data, b"PK\x03\x04");
        assert_eq!(artifact.filename.as_deref(), Some("reporte.zip"));
    }

    #[tokio::test]
    async fn fetch_artifact_without_disposition_has_no_filename() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/downloads/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let artifact = api.fetch_artifact(&JobId::new("t1")).await.unwrap();
        assert!(artifact.filename.is_none());
    }

    #[tokio::test]
    async fn fetch_artifact_maps_404_to_job_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/downloads/t1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&api_config(&server)).unwrap();
        let err = api.fetch_artifact(&JobId::new("t1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn requests_carry_the_configured_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/t1/status"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "PENDING"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiConfig {
            base_url: server.uri(),
            auth_header: Some("Bearer secret".to_string()),
            ..ApiConfig::default()
        };
        let api = HttpJobsApi::new(&config).unwrap();
        api.job_status(&JobId::new("t1")).await.unwrap();
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/t1/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "PENDING"})),
            )
            .mount(&server)
            .await;

        let config = ApiConfig {
            base_url: format!("{}/", server.uri()),
            ..ApiConfig::default()
        };
        let api = HttpJobsApi::new(&config).unwrap();
        assert!(api.job_status(&JobId::new("t1")).await.is_ok());
    }
}
