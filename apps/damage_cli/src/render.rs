//! Plain-text rendering of controller snapshots.

use std::fmt::Write as _;

use chrono::Local;
use shared::protocol::{AnalysisDetail, AnalysisResult, AnalysisSummary, DamageFinding};

const BAR_WIDTH: usize = 20;

pub fn format_confidence(score: f64) -> String {
    format!("{score:.2}%")
}

/// Share of a 0-100 score, pinned to [0, 1] for drawing.
pub fn confidence_fraction(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    (score / 100.0).clamp(0.0, 1.0)
}

pub fn confidence_bar(score: f64) -> String {
    let filled = (confidence_fraction(score) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        format_confidence(score)
    )
}

fn detection_line(detected: bool, yes: &'static str, no: &'static str) -> &'static str {
    if detected {
        yes
    } else {
        no
    }
}

fn write_damage_details(out: &mut String, damage_detected: bool, details: &[DamageFinding]) {
    if details.is_empty() {
        if damage_detected {
            out.push_str("Damage details: none itemized\n");
        }
        return;
    }
    out.push_str("Damage details:\n");
    for finding in details {
        let _ = writeln!(
            out,
            "  {:<24} {} confidence",
            finding.name,
            format_confidence(finding.confidence)
        );
    }
}

fn display_timestamp(summary: &AnalysisSummary) -> String {
    match summary.recorded_at() {
        Some(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => summary.timestamp.clone(),
    }
}

pub fn analysis_result(result: &AnalysisResult) -> String {
    let analysis = &result.analysis;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Vehicle detection: {}",
        detection_line(analysis.is_vehicle, "Vehicle detected", "No vehicle detected")
    );
    let _ = writeln!(
        out,
        "Damage assessment: {}",
        detection_line(analysis.damage_detected, "Damage detected", "No damage detected")
    );
    let _ = writeln!(out, "Confidence: {}", confidence_bar(analysis.confidence_score));
    write_damage_details(&mut out, analysis.damage_detected, &analysis.damage_details);
    if !result.image_url.is_empty() {
        let _ = writeln!(out, "Image: {}", result.image_url);
    }
    out
}

pub fn history_list(summaries: &[AnalysisSummary]) -> String {
    if summaries.is_empty() {
        return "No analyses yet.\n".to_string();
    }
    let mut out = String::new();
    for summary in summaries {
        let _ = writeln!(
            out,
            "Analysis #{:<8}  {:<19}  {:<9}  Confidence: {}",
            summary.analysis_id.short(),
            display_timestamp(summary),
            detection_line(summary.damage_detected, "Damage", "No damage"),
            format_confidence(summary.confidence_score)
        );
    }
    out
}

pub fn analysis_detail(detail: &AnalysisDetail) -> String {
    let summary = &detail.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Analysis ID: {}", summary.analysis_id);
    let _ = writeln!(out, "Date: {}", display_timestamp(summary));
    let _ = writeln!(
        out,
        "{}",
        detection_line(summary.damage_detected, "Damage Detected", "No Damage Detected")
    );
    let _ = writeln!(
        out,
        "Confidence Score: {}",
        confidence_bar(summary.confidence_score)
    );
    write_damage_details(&mut out, summary.damage_detected, detail.damage_details());
    let _ = writeln!(out, "Image: {}", summary.image_url);
    out
}
