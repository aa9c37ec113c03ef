use shared::domain::AnalysisId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("analysis {analysis_id} not found")]
    NotFound { analysis_id: AnalysisId },
    #[error("analysis service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response from analysis service: {0}")]
    Decode(String),
    #[error("analysis service unreachable: {0}")]
    Network(String),
    #[error("could not build request: {0}")]
    Request(String),
    #[error("request was abandoned before the analysis service answered")]
    Interrupted,
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Request(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no image selected")]
    NoFileSelected,
    #[error("an analysis is already being submitted")]
    SubmissionInFlight,
}
