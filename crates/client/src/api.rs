//! Client for the shop API's KISS import endpoints.
//!
//! [`ShopApi`] is the seam the import session talks through;
//! [`HttpShopApi`] implements it over HTTP with [`reqwest`].

use async_trait::async_trait;
use kiss_core::preferences::{DiscardType, ImportPreferences};
use kiss_core::staged_part::StagedPart;
use kiss_core::types::{JobId, Timestamp};
use serde::Deserialize;

use crate::messages::{
    CommitRequest, CommitResponse, DeletionReport, DeletionReportRequest, StagedImport,
};
use crate::progress::ProgressChannel;

/// Errors from the shop API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server refused the request because of conflicting data (409).
    #[error("{header}: {detail}")]
    Conflict { header: String, detail: String },

    /// The server returned any other non-2xx status.
    #[error("{header} ({status}): {detail}")]
    Server {
        status: u16,
        header: String,
        detail: String,
    },
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Short heading for a notice.
    pub fn header(&self) -> &str {
        match self {
            Self::Request(_) => "Request failed",
            Self::Conflict { header, .. } | Self::Server { header, .. } => header,
        }
    }

    /// Body text for a notice.
    pub fn detail(&self) -> String {
        match self {
            Self::Request(e) => e.to_string(),
            Self::Conflict { detail, .. } | Self::Server { detail, .. } => detail.clone(),
        }
    }

    /// Build the error for a failed response from its status and body.
    ///
    /// The server reports `{"Header": ..., "Detail": ...}`; anything else is
    /// passed through as the detail.
    pub fn from_status(status: u16, body: &str) -> Self {
        let (header, detail) = match serde_json::from_str::<ServerErrorBody>(body) {
            Ok(parsed) => (
                parsed.header.unwrap_or_else(|| default_header(status)),
                parsed.detail.unwrap_or_default(),
            ),
            Err(_) => (default_header(status), body.to_string()),
        };

        if status == 409 {
            Self::Conflict { header, detail }
        } else {
            Self::Server {
                status,
                header,
                detail,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    #[serde(rename = "Header", alias = "header")]
    header: Option<String>,
    #[serde(rename = "Detail", alias = "detail")]
    detail: Option<String>,
}

fn default_header(status: u16) -> String {
    if status == 409 {
        "Conflict".to_string()
    } else {
        "Server error".to_string()
    }
}

/// Operations the import engine needs from the shop API.
#[async_trait]
pub trait ShopApi: Send + Sync {
    /// Load staged rows, file header and preferences for a job.
    async fn fetch_staged_records(
        &self,
        job_id: JobId,
        keep_minors: bool,
        use_cached_settings: bool,
    ) -> Result<StagedImport, ApiError>;

    async fn fetch_preferences(&self, job_id: JobId) -> Result<ImportPreferences, ApiError>;

    /// Stage in-progress row edits on the server before a settings save.
    async fn cache_edited_parts(&self, parts: &[StagedPart], job_id: JobId) -> Result<(), ApiError>;

    async fn save_preferences(
        &self,
        preferences: &ImportPreferences,
        job_id: JobId,
    ) -> Result<(), ApiError>;

    async fn save_discard_types(&self, discard_types: &[DiscardType]) -> Result<(), ApiError>;

    async fn commit_import(&self, request: &CommitRequest) -> Result<CommitResponse, ApiError>;

    /// Ask for a report of destination records to delete after an import.
    async fn request_deletion_report(
        &self,
        job_id: JobId,
        import_start_time: &Timestamp,
    ) -> Result<DeletionReport, ApiError>;

    /// Open the server-sent progress channel for a session token.
    async fn open_progress_channel(&self, session_token: &str) -> Result<ProgressChannel, ApiError>;
}

/// HTTP implementation of [`ShopApi`].
pub struct HttpShopApi {
    client: reqwest::Client,
    api_url: String,
    auth_token: String,
}

impl HttpShopApi {
    /// * `api_url`    - Base URL, e.g. `https://shop.example.com/api`.
    /// * `auth_token` - Bearer token sent with every request.
    pub fn new(api_url: String, auth_token: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, auth_token)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, auth_token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    // ---- private helpers ----

    /// Pass a success response through; otherwise read the body and turn
    /// it into an [`ApiError`] carrying the server's header and detail.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Decode a successful JSON body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Check the status and drop the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ShopApi for HttpShopApi {
    async fn fetch_staged_records(
        &self,
        job_id: JobId,
        keep_minors: bool,
        use_cached_settings: bool,
    ) -> Result<StagedImport, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/kiss/jobs/{job_id}/staged")))
            .bearer_auth(&self.auth_token)
            .query(&[
                ("keepMinors", keep_minors.to_string()),
                ("useCachedSettings", use_cached_settings.to_string()),
            ])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch_preferences(&self, job_id: JobId) -> Result<ImportPreferences, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/kiss/jobs/{job_id}/preferences")))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn cache_edited_parts(&self, parts: &[StagedPart], job_id: JobId) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("/kiss/jobs/{job_id}/staged")))
            .bearer_auth(&self.auth_token)
            .json(parts)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn save_preferences(
        &self,
        preferences: &ImportPreferences,
        job_id: JobId,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("/kiss/jobs/{job_id}/preferences")))
            .bearer_auth(&self.auth_token)
            .json(preferences)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn save_discard_types(&self, discard_types: &[DiscardType]) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url("/kiss/discard-types"))
            .bearer_auth(&self.auth_token)
            .json(discard_types)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn commit_import(&self, request: &CommitRequest) -> Result<CommitResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/kiss/import"))
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn request_deletion_report(
        &self,
        job_id: JobId,
        import_start_time: &Timestamp,
    ) -> Result<DeletionReport, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/kiss/jobs/{job_id}/deletion-report")))
            .bearer_auth(&self.auth_token)
            .json(&DeletionReportRequest { import_start_time })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn open_progress_channel(&self, session_token: &str) -> Result<ProgressChannel, ApiError> {
        let response = self
            .client
            .get(self.url("/kiss/progress"))
            .query(&[("token", session_token)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(ProgressChannel::spawn(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn conflict_status_maps_to_conflict() {
        let err = ApiError::from_status(409, r#"{"Header":"Sequence conflict","Detail":"Seq 4 exists"}"#);
        assert!(err.is_conflict());
        assert_eq!(err.header(), "Sequence conflict");
        assert_eq!(err.detail(), "Seq 4 exists");
    }

    #[test]
    fn server_error_keeps_status_and_text() {
        let err = ApiError::from_status(500, r#"{"header":"Import failed","detail":"Bad shape"}"#);
        assert_matches!(err, ApiError::Server { status: 500, .. });
        assert_eq!(err.to_string(), "Import failed (500): Bad shape");
    }

    #[test]
    fn unparseable_body_becomes_detail() {
        let err = ApiError::from_status(502, "gateway down");
        assert_eq!(err.header(), "Server error");
        assert_eq!(err.detail(), "gateway down");

        let err = ApiError::from_status(409, "");
        assert_eq!(err.header(), "Conflict");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = HttpShopApi::new("http://localhost:8080/api/".into(), "t".into());
        assert_eq!(api.api_url(), "http://localhost:8080/api");
        assert_eq!(api.url("/kiss/import"), "http://localhost:8080/api/kiss/import");
    }
}
