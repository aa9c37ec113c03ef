use std::{fmt, path::Path, sync::Arc};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::AnalysisId,
    error::ServiceErrorBody,
    protocol::{AnalysisDetail, AnalysisResult, AnalysisSummary},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::ClientSettings, error::TransferError};

const ANALYZE_PATH: &[&str] = &["analysis", "analyze-car"];
const LIST_PATH: &[&str] = &["analysis", "analyses"];
const DETAIL_PREFIX: &[&str] = &["analysis", "analysis"];
const UPLOAD_FIELD: &str = "file";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    file_name: String,
    content_type: Option<String>,
    bytes: Arc<[u8]>,
}

impl AnalysisRequest {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            file_name,
            content_type,
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// One exchange per call: no retries, no caching.
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn submit_for_analysis(
        &self,
        image: &AnalysisRequest,
    ) -> Result<AnalysisResult, TransferError>;
    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>, TransferError>;
    async fn get_analysis(&self, analysis_id: &AnalysisId)
        -> Result<AnalysisDetail, TransferError>;
}

pub struct HttpTransferClient {
    http: Client,
    service_url: Url,
}

impl HttpTransferClient {
    pub fn new(service_url: Url) -> Self {
        Self {
            http: Client::new(),
            service_url,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(settings.service_url.clone())
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransferError> {
        let mut url = self.service_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TransferError::Request(format!("service url {} cannot take a path", self.service_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn submit_for_analysis(
        &self,
        image: &AnalysisRequest,
    ) -> Result<AnalysisResult, TransferError> {
        let url = self.endpoint(ANALYZE_PATH)?;
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.content_type().unwrap_or(FALLBACK_CONTENT_TYPE))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        info!(
            file_name = image.file_name(),
            size_bytes = image.size_bytes(),
            "analysis: submitting image"
        );
        let response = self.http.post(url).multipart(form).send().await?;
        let result: AnalysisResult = read_json(response).await.inspect_err(|err| {
            warn!(file_name = image.file_name(), "analysis: submission failed: {err}");
        })?;
        info!(
            image_url = %result.image_url,
            damage_detected = result.analysis.damage_detected,
            confidence_score = result.analysis.confidence_score,
            "analysis: result received"
        );
        Ok(result)
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>, TransferError> {
        let url = self.endpoint(LIST_PATH)?;
        let response = self.http.get(url).send().await?;
        let summaries: Vec<AnalysisSummary> = read_json(response).await?;
        debug!(count = summaries.len(), "analysis: history listed");
        Ok(summaries)
    }

    async fn get_analysis(
        &self,
        analysis_id: &AnalysisId,
    ) -> Result<AnalysisDetail, TransferError> {
        let mut segments = DETAIL_PREFIX.to_vec();
        segments.push(analysis_id.as_str());
        let url = self.endpoint(&segments)?;
        let response = self.http.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            info!(analysis_id = %analysis_id, "analysis: detail not found");
            return Err(TransferError::NotFound {
                analysis_id: analysis_id.clone(),
            });
        }

        let detail: AnalysisDetail = read_json(response).await?;
        debug!(analysis_id = %analysis_id, "analysis: detail fetched");
        Ok(detail)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransferError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    Ok(serde_json::from_slice(&body)?)
}

fn status_error(status: StatusCode, body: &[u8]) -> TransferError {
    let message = serde_json::from_slice::<ServiceErrorBody>(body)
        .ok()
        .and_then(|body| body.message())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    TransferError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
