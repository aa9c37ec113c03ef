//! Scripted transport for controller tests: every call takes the next
//! response queued for it and waits until the test releases it.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use shared::{
    domain::AnalysisId,
    protocol::{
        AnalysisDetail, AnalysisResult, AnalysisResults, AnalysisSummary, DamageAnalysis,
        DamageFinding, DetectedLabel,
    },
};
use tokio::sync::oneshot;

use crate::{
    error::TransferError,
    transport::{AnalysisRequest, TransferClient},
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, TransferError>>;
type Pending<T> = oneshot::Receiver<Result<T, TransferError>>;

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    submissions: Mutex<VecDeque<Pending<AnalysisResult>>>,
    lists: Mutex<VecDeque<Pending<Vec<AnalysisSummary>>>>,
    details: Mutex<HashMap<AnalysisId, VecDeque<Pending<AnalysisDetail>>>>,
    submitted_files: Mutex<Vec<String>>,
    submit_calls: AtomicUsize,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn expect_submission(&self) -> Reply<AnalysisResult> {
        let (tx, rx) = oneshot::channel();
        self.submissions.lock().expect("lock").push_back(rx);
        tx
    }

    pub(crate) fn answer_submission(&self, outcome: Result<AnalysisResult, TransferError>) {
        let _ = self.expect_submission().send(outcome);
    }

    pub(crate) fn expect_list(&self) -> Reply<Vec<AnalysisSummary>> {
        let (tx, rx) = oneshot::channel();
        self.lists.lock().expect("lock").push_back(rx);
        tx
    }

    pub(crate) fn answer_list(&self, outcome: Result<Vec<AnalysisSummary>, TransferError>) {
        let _ = self.expect_list().send(outcome);
    }

    pub(crate) fn expect_detail(&self, analysis_id: &str) -> Reply<AnalysisDetail> {
        let (tx, rx) = oneshot::channel();
        self.details
            .lock()
            .expect("lock")
            .entry(AnalysisId::from(analysis_id))
            .or_default()
            .push_back(rx);
        tx
    }

    pub(crate) fn answer_detail(
        &self,
        analysis_id: &str,
        outcome: Result<AnalysisDetail, TransferError>,
    ) {
        let _ = self.expect_detail(analysis_id).send(outcome);
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn submitted_files(&self) -> Vec<String> {
        self.submitted_files.lock().expect("lock").clone()
    }
}

async fn released<T>(pending: Option<Pending<T>>) -> Result<T, TransferError> {
    match pending {
        Some(rx) => rx.await.unwrap_or(Err(TransferError::Interrupted)),
        None => Err(TransferError::Network("no scripted response".into())),
    }
}

#[async_trait]
impl TransferClient for ScriptedTransport {
    async fn submit_for_analysis(
        &self,
        image: &AnalysisRequest,
    ) -> Result<AnalysisResult, TransferError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_files
            .lock()
            .expect("lock")
            .push(image.file_name().to_string());
        let pending = self.submissions.lock().expect("lock").pop_front();
        released(pending).await
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisSummary>, TransferError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.lists.lock().expect("lock").pop_front();
        released(pending).await
    }

    async fn get_analysis(
        &self,
        analysis_id: &AnalysisId,
    ) -> Result<AnalysisDetail, TransferError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .details
            .lock()
            .expect("lock")
            .get_mut(analysis_id)
            .and_then(VecDeque::pop_front);
        released(pending).await
    }
}

pub(crate) fn jpeg(file_name: &str, size_bytes: usize) -> AnalysisRequest {
    AnalysisRequest::new(file_name, vec![0xFF; size_bytes])
}

pub(crate) fn bumper_dent_result() -> AnalysisResult {
    AnalysisResult {
        image_url: "https://bucket.example/cars/crash.jpg".into(),
        analysis: DamageAnalysis {
            is_vehicle: true,
            damage_detected: true,
            confidence_score: 87.5,
            damage_details: vec![DamageFinding {
                name: "bumper_dent".into(),
                confidence: 91.2,
            }],
            damage_related_text: vec!["Dent".into()],
            all_labels: vec![DetectedLabel {
                name: "Car".into(),
                confidence: 99.0,
                parents: vec!["Vehicle".into()],
            }],
        },
    }
}

pub(crate) fn summary(analysis_id: &str) -> AnalysisSummary {
    AnalysisSummary {
        analysis_id: AnalysisId::from(analysis_id),
        image_url: format!("https://bucket.example/cars/{analysis_id}.jpg"),
        timestamp: "2024-05-01T10:00:00".into(),
        damage_detected: true,
        confidence_score: 87.5,
    }
}

pub(crate) fn detail(analysis_id: &str) -> AnalysisDetail {
    AnalysisDetail {
        summary: summary(analysis_id),
        analysis_results: Some(AnalysisResults {
            damage_details: Some(vec![DamageFinding {
                name: format!("{analysis_id}_dent"),
                confidence: 80.0,
            }]),
            extra: Default::default(),
        }),
    }
}
