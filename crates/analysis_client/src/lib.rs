use std::sync::Arc;

pub mod config;
pub mod error;
pub mod history;
pub mod transport;
pub mod upload;

pub use config::{load_settings, ClientSettings};
pub use error::{TransferError, ValidationError};
pub use history::{
    DetailFailure, HistoryController, HistorySnapshot, ListStatus, RefreshOutcome,
    SelectionOutcome,
};
pub use transport::{AnalysisRequest, HttpTransferClient, TransferClient};
pub use upload::{
    DragEvent, SelectedFile, SubmissionOutcome, UploadController, UploadPhase, UploadSnapshot,
};

pub struct AnalysisSession {
    pub upload: UploadController,
    pub history: HistoryController,
}

impl AnalysisSession {
    pub fn new(transport: Arc<dyn TransferClient>) -> Self {
        Self {
            upload: UploadController::new(Arc::clone(&transport)),
            history: HistoryController::new(transport),
        }
    }

    pub fn connect(settings: &ClientSettings) -> Self {
        Self::new(Arc::new(HttpTransferClient::from_settings(settings)))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
