use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use shared::protocol::AnalysisResult;
use tracing::{debug, info, warn};

use crate::{
    error::{TransferError, ValidationError},
    transport::{AnalysisRequest, TransferClient},
};

#[derive(Debug, Clone, PartialEq)]
pub enum UploadPhase {
    Idle,
    FileSelected,
    Submitting,
    Succeeded(AnalysisResult),
    Failed(TransferError),
}

impl UploadPhase {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransferError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Succeeded,
    Failed,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub file_name: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSnapshot {
    pub phase: UploadPhase,
    pub selected_file: Option<SelectedFile>,
    pub submission_in_flight: bool,
    pub drag_active: bool,
}

impl UploadSnapshot {
    /// Whether `submit` would be accepted. `phase` can read `FileSelected`
    /// while an earlier submission is still outstanding, so check this instead.
    pub fn can_submit(&self) -> bool {
        self.selected_file.is_some() && !self.submission_in_flight
    }
}

struct UploadState {
    phase: UploadPhase,
    selected: Option<AnalysisRequest>,
    // Bumped on every selection change so late responses can be matched.
    selection_seq: u64,
    in_flight: Option<u64>,
}

pub struct UploadController {
    transport: Arc<dyn TransferClient>,
    state: Mutex<UploadState>,
    drag_active: AtomicBool,
}

impl UploadController {
    pub fn new(transport: Arc<dyn TransferClient>) -> Self {
        Self {
            transport,
            state: Mutex::new(UploadState {
                phase: UploadPhase::Idle,
                selected: None,
                selection_seq: 0,
                in_flight: None,
            }),
            drag_active: AtomicBool::new(false),
        }
    }

    /// `None` is a cancelled picker and returns to `Idle`.
    pub fn select_file(&self, file: Option<AnalysisRequest>) {
        let mut state = self.lock_state();
        state.selection_seq += 1;
        match file {
            Some(file) => {
                info!(
                    file_name = file.file_name(),
                    size_bytes = file.size_bytes(),
                    "upload: file selected"
                );
                state.selected = Some(file);
                state.phase = UploadPhase::FileSelected;
            }
            None => {
                debug!("upload: selection cleared");
                state.selected = None;
                state.phase = UploadPhase::Idle;
            }
        }
        if state.in_flight.is_some() {
            debug!("upload: selection changed while a submission is outstanding");
        }
    }

    pub fn set_drag_active(&self, active: bool) {
        self.drag_active.store(active, Ordering::Relaxed);
    }

    pub fn handle_drag(&self, event: DragEvent) {
        match event {
            DragEvent::Enter | DragEvent::Over => self.set_drag_active(true),
            DragEvent::Leave => self.set_drag_active(false),
        }
    }

    pub fn drop_files(&self, files: impl IntoIterator<Item = AnalysisRequest>) {
        self.set_drag_active(false);
        if let Some(file) = files.into_iter().next() {
            self.select_file(Some(file));
        }
    }

    /// Enters `Submitting` at the first poll. On failure the file stays selected.
    pub async fn submit(&self) -> Result<SubmissionOutcome, ValidationError> {
        let (image, mut pending) = {
            let mut state = self.lock_state();
            if state.in_flight.is_some() {
                return Err(ValidationError::SubmissionInFlight);
            }
            let Some(image) = state.selected.clone() else {
                return Err(ValidationError::NoFileSelected);
            };
            let selection = state.selection_seq;
            state.in_flight = Some(selection);
            state.phase = UploadPhase::Submitting;
            (
                image,
                PendingSubmission {
                    state: &self.state,
                    selection,
                    settled: false,
                },
            )
        };

        let outcome = self.transport.submit_for_analysis(&image).await;
        Ok(pending.settle(outcome))
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        let state = self.lock_state();
        UploadSnapshot {
            phase: state.phase.clone(),
            selected_file: state.selected.as_ref().map(|file| SelectedFile {
                file_name: file.file_name().to_string(),
                size_bytes: file.size_bytes(),
            }),
            submission_in_flight: state.in_flight.is_some(),
            drag_active: self.drag_active.load(Ordering::Relaxed),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, UploadState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<UploadState>) -> MutexGuard<'_, UploadState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// Dropped unsettled, it moves the controller out of `Submitting`.
struct PendingSubmission<'a> {
    state: &'a Mutex<UploadState>,
    selection: u64,
    settled: bool,
}

impl PendingSubmission<'_> {
    fn settle(&mut self, outcome: Result<AnalysisResult, TransferError>) -> SubmissionOutcome {
        self.settled = true;
        let mut state = lock(self.state);
        state.in_flight = None;

        if state.selection_seq != self.selection {
            debug!("upload: discarding response for a replaced selection");
            return SubmissionOutcome::Superseded;
        }

        match outcome {
            Ok(result) => {
                info!(
                    damage_detected = result.analysis.damage_detected,
                    "upload: analysis succeeded"
                );
                state.selected = None;
                state.phase = UploadPhase::Succeeded(result);
                SubmissionOutcome::Succeeded
            }
            Err(err) => {
                warn!("upload: analysis failed: {err}");
                state.phase = UploadPhase::Failed(err);
                SubmissionOutcome::Failed
            }
        }
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(self.state);
        state.in_flight = None;
        if state.selection_seq == self.selection && state.phase.is_submitting() {
            warn!("upload: submission abandoned before a response arrived");
            state.phase = UploadPhase::Failed(TransferError::Interrupted);
        }
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
