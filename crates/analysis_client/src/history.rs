use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::AnalysisId,
    protocol::{AnalysisDetail, AnalysisSummary},
};
use tracing::{debug, info, warn};

use crate::{error::TransferError, transport::TransferClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    NotLoaded,
    Loading,
    Refreshing,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { count: usize },
    Failed,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Loaded,
    Failed,
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailFailure {
    pub analysis_id: AnalysisId,
    pub error: TransferError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub summaries: Vec<AnalysisSummary>,
    pub list_status: ListStatus,
    pub list_error: Option<TransferError>,
    pub selected_id: Option<AnalysisId>,
    pub detail: Option<AnalysisDetail>,
    pub detail_loading: bool,
    pub detail_error: Option<DetailFailure>,
}

#[derive(Debug)]
struct PendingSelection {
    token: u64,
    analysis_id: AnalysisId,
}

#[derive(Default)]
struct HistoryState {
    summaries: Vec<AnalysisSummary>,
    loaded: bool,
    refresh_seq: u64,
    refresh_pending: Option<u64>,
    // Token of the refresh whose list is shown.
    applied_refresh: u64,
    list_error: Option<TransferError>,
    selection_seq: u64,
    pending_selection: Option<PendingSelection>,
    detail: Option<AnalysisDetail>,
    detail_error: Option<DetailFailure>,
}

impl HistoryState {
    fn is_current_refresh(&self, token: u64) -> bool {
        self.refresh_pending == Some(token)
    }

    fn is_current_selection(&self, token: u64) -> bool {
        self.pending_selection
            .as_ref()
            .is_some_and(|pending| pending.token == token)
    }
}

pub struct HistoryController {
    transport: Arc<dyn TransferClient>,
    state: Mutex<HistoryState>,
}

impl HistoryController {
    pub fn new(transport: Arc<dyn TransferClient>) -> Self {
        Self {
            transport,
            state: Mutex::new(HistoryState::default()),
        }
    }

    /// A successful list is applied unless a newer refresh already applied
    /// one. A failure sets the list error only for the newest refresh.
    pub async fn refresh_list(&self) -> RefreshOutcome {
        let mut pending = {
            let mut state = self.lock_state();
            state.refresh_seq += 1;
            let token = state.refresh_seq;
            state.refresh_pending = Some(token);
            PendingRefresh {
                state: &self.state,
                token,
                settled: false,
            }
        };

        let outcome = self.transport.list_analyses().await;
        pending.settle(outcome)
    }

    /// The selection is recorded at the first poll; the response is applied
    /// only if no newer selection or deselect happened meanwhile.
    pub async fn select_and_load(&self, analysis_id: AnalysisId) -> SelectionOutcome {
        let mut pending = {
            let mut state = self.lock_state();
            state.selection_seq += 1;
            let token = state.selection_seq;
            if state
                .detail
                .as_ref()
                .is_some_and(|detail| detail.analysis_id() != &analysis_id)
            {
                state.detail = None;
            }
            state.detail_error = None;
            state.pending_selection = Some(PendingSelection {
                token,
                analysis_id: analysis_id.clone(),
            });
            PendingDetail {
                state: &self.state,
                token,
                settled: false,
            }
        };

        let outcome = self
            .transport
            .get_analysis(&analysis_id)
            .await
            .and_then(|detail| {
                if detail.analysis_id() == &analysis_id {
                    Ok(detail)
                } else {
                    Err(TransferError::Decode(format!(
                        "requested analysis {analysis_id} but received {}",
                        detail.analysis_id()
                    )))
                }
            });
        pending.settle(analysis_id, outcome)
    }

    pub fn deselect(&self) {
        let mut state = self.lock_state();
        if let Some(pending) = state.pending_selection.take() {
            debug!(analysis_id = %pending.analysis_id, "history: pending selection dropped");
        }
        state.detail = None;
        state.detail_error = None;
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.lock_state();
        let list_status = match (state.refresh_pending.is_some(), state.loaded) {
            (true, false) => ListStatus::Loading,
            (true, true) => ListStatus::Refreshing,
            (false, true) => ListStatus::Ready,
            (false, false) => ListStatus::NotLoaded,
        };
        let selected_id = state
            .pending_selection
            .as_ref()
            .map(|pending| pending.analysis_id.clone())
            .or_else(|| {
                state
                    .detail
                    .as_ref()
                    .map(|detail| detail.analysis_id().clone())
            });
        HistorySnapshot {
            summaries: state.summaries.clone(),
            list_status,
            list_error: state.list_error.clone(),
            selected_id,
            detail: state.detail.clone(),
            detail_loading: state.pending_selection.is_some(),
            detail_error: state.detail_error.clone(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, HistoryState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<HistoryState>) -> MutexGuard<'_, HistoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PendingRefresh<'a> {
    state: &'a Mutex<HistoryState>,
    token: u64,
    settled: bool,
}

impl PendingRefresh<'_> {
    fn settle(
        &mut self,
        outcome: Result<Vec<AnalysisSummary>, TransferError>,
    ) -> RefreshOutcome {
        self.settled = true;
        let mut state = lock(self.state);
        let newest = state.is_current_refresh(self.token);
        if newest {
            state.refresh_pending = None;
        }

        match outcome {
            Ok(summaries) if self.token > state.applied_refresh => {
                let count = summaries.len();
                info!(count, token = self.token, "history: list refreshed");
                state.summaries = summaries;
                state.applied_refresh = self.token;
                state.loaded = true;
                state.list_error = None;
                RefreshOutcome::Updated { count }
            }
            Err(err) if newest => {
                warn!("history: list refresh failed: {err}");
                state.list_error = Some(err);
                RefreshOutcome::Failed
            }
            _ => {
                debug!(token = self.token, "history: discarding result of an older refresh");
                RefreshOutcome::Superseded
            }
        }
    }
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(self.state);
        if state.is_current_refresh(self.token) {
            state.refresh_pending = None;
        }
    }
}

struct PendingDetail<'a> {
    state: &'a Mutex<HistoryState>,
    token: u64,
    settled: bool,
}

impl PendingDetail<'_> {
    fn settle(
        &mut self,
        analysis_id: AnalysisId,
        outcome: Result<AnalysisDetail, TransferError>,
    ) -> SelectionOutcome {
        self.settled = true;
        let mut state = lock(self.state);
        if !state.is_current_selection(self.token) {
            debug!(analysis_id = %analysis_id, "history: discarding detail for a superseded selection");
            return SelectionOutcome::Superseded;
        }
        state.pending_selection = None;

        match outcome {
            Ok(detail) => {
                info!(analysis_id = %analysis_id, "history: detail loaded");
                state.detail = Some(detail);
                SelectionOutcome::Loaded
            }
            Err(error) => {
                warn!(analysis_id = %analysis_id, "history: detail fetch failed: {error}");
                state.detail = None;
                state.detail_error = Some(DetailFailure { analysis_id, error });
                SelectionOutcome::Failed
            }
        }
    }
}

impl Drop for PendingDetail<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(self.state);
        if state.is_current_selection(self.token) {
            state.pending_selection = None;
        }
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
