use std::path::{Path, PathBuf};

use analysis_client::{
    load_settings, AnalysisRequest, AnalysisSession, ClientSettings, UploadPhase,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::AnalysisId;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(about = "Submit vehicle photos for damage analysis and browse past results")]
struct Cli {
    /// Analysis service base url; overrides analysis_client.toml and the environment.
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one image and print its damage assessment.
    Analyze { image: PathBuf },
    /// List stored analyses.
    History,
    /// Show the full record of one stored analysis.
    Show { analysis_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = match cli.service_url.as_deref() {
        Some(url) => ClientSettings::with_service_url(url)?,
        None => load_settings()?,
    };
    tracing::debug!(service_url = %settings.service_url, "using analysis service");
    let session = AnalysisSession::connect(&settings);

    match cli.command {
        Command::Analyze { image } => analyze(&session, &image).await,
        Command::History => history(&session).await,
        Command::Show { analysis_id } => show(&session, AnalysisId::from(analysis_id)).await,
    }
}

async fn analyze(session: &AnalysisSession, image: &Path) -> Result<()> {
    let request = AnalysisRequest::from_path(image)
        .await
        .with_context(|| format!("failed to read image '{}'", image.display()))?;
    session.upload.select_file(Some(request));
    session.upload.submit().await?;

    match session.upload.snapshot().phase {
        UploadPhase::Succeeded(result) => {
            print!("{}", render::analysis_result(&result));
            Ok(())
        }
        UploadPhase::Failed(err) => bail!("analysis failed: {err}"),
        other => bail!("analysis did not complete (state: {other:?})"),
    }
}

async fn history(session: &AnalysisSession) -> Result<()> {
    session.history.refresh_list().await;
    let snapshot = session.history.snapshot();
    if let Some(err) = snapshot.list_error {
        bail!("failed to load analysis history: {err}");
    }
    print!("{}", render::history_list(&snapshot.summaries));
    Ok(())
}

async fn show(session: &AnalysisSession, analysis_id: AnalysisId) -> Result<()> {
    session.history.select_and_load(analysis_id.clone()).await;
    let snapshot = session.history.snapshot();

    if let Some(failure) = snapshot.detail_error {
        if failure.error.is_not_found() {
            bail!("no analysis with id {}", failure.analysis_id);
        }
        bail!("failed to load analysis {}: {}", failure.analysis_id, failure.error);
    }
    let Some(detail) = snapshot.detail else {
        bail!("analysis {analysis_id} could not be loaded");
    };
    print!("{}", render::analysis_detail(&detail));
    Ok(())
}
