use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::analysis::ContentAnalyzer;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::janitor::TempFileJanitor;
use crate::llm::LLM;
use crate::models::{ClipRequest, IngestRequest, IntroRecord, NewIntro, SubmitterMetadata};
use crate::store::IntroStore;
use crate::video::{AcquiredClip, ClipAcquirer};

/// Validate, acquire, analyze, persist. The acquired clip is deleted on
/// every exit path once acquisition has succeeded.
#[derive(Clone)]
pub struct IngestionPipeline {
    max_clip_seconds: u32,
    acquirer: ClipAcquirer,
    analyzer: ContentAnalyzer,
    store: Arc<dyn IntroStore>,
    janitor: TempFileJanitor,
}

impl IngestionPipeline {
    pub fn new(
        config: &Config,
        acquirer: ClipAcquirer,
        analyzer: ContentAnalyzer,
        store: Arc<dyn IntroStore>,
        janitor: TempFileJanitor,
    ) -> Self {
        Self {
            max_clip_seconds: config.acquisition.max_clip_seconds,
            acquirer,
            analyzer,
            store,
            janitor,
        }
    }

    /// Wire up the default collaborators from configuration
    pub fn from_config(config: &Config, llm: Arc<dyn LLM>, store: Arc<dyn IntroStore>) -> Self {
        Self::new(
            config,
            ClipAcquirer::new(&config.acquisition),
            ContentAnalyzer::new(llm),
            store,
            TempFileJanitor::new(config.acquisition.scratch_dir.clone()),
        )
    }

    pub fn store(&self) -> &Arc<dyn IntroStore> {
        &self.store
    }

    pub fn acquirer(&self) -> &ClipAcquirer {
        &self.acquirer
    }

    pub fn analyzer(&self) -> &ContentAnalyzer {
        &self.analyzer
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IntroRecord> {
        let total_start = Instant::now();

        let submitter = request.submitter;
        submitter.validate()?;
        let clip_request = ClipRequest::new(
            &request.video_url,
            request.start_time,
            request.end_time,
            self.max_clip_seconds,
        )?;

        info!(
            "📝 New intro submission: \"{}\" by {} ({}s, {}s - {}s, category {})",
            submitter.video_title,
            submitter.channel_name,
            clip_request.duration(),
            clip_request.start_time(),
            clip_request.end_time(),
            submitter.category
        );

        info!("⏬ Step 1/3: downloading clip");
        let download_start = Instant::now();
        let clip = self
            .acquirer
            .acquire(
                clip_request.source_url(),
                clip_request.start_time(),
                clip_request.end_time(),
                clip_request.source_id(),
            )
            .await
            .map_err(|e| {
                error!("❌ Acquisition failed for {}: {}", clip_request.source_id(), e);
                PipelineError::from(e)
            })?;
        let download_time = download_start.elapsed();

        // The analysis and store futures have completed by the time this
        // returns, so the clip is no longer in use when it is deleted.
        let outcome = self.analyze_and_persist(&clip_request, &submitter, &clip).await;
        self.janitor.delete_file(&clip.path).await;

        match outcome {
            Ok((record, analysis_time)) => {
                info!(
                    "✅ Intro {} saved | Mood: {} | Style: {} | Pace: {}",
                    record.id,
                    record.analysis().mood,
                    record.analysis().visual_style,
                    record.analysis().pace
                );
                info!(
                    "⏱️ Download: {:.1}s | Analysis: {:.1}s | Total: {:.1}s",
                    download_time.as_secs_f64(),
                    analysis_time.as_secs_f64(),
                    total_start.elapsed().as_secs_f64()
                );
                Ok(record)
            }
            Err(e) => {
                error!("❌ Ingestion of {} failed: {}", clip_request.source_id(), e);
                Err(e)
            }
        }
    }

    async fn analyze_and_persist(
        &self,
        clip_request: &ClipRequest,
        submitter: &SubmitterMetadata,
        clip: &AcquiredClip,
    ) -> Result<(IntroRecord, std::time::Duration)> {
        info!("🤖 Step 2/3: analyzing clip ({})", clip.strategy_label);
        let analysis_start = Instant::now();
        let analysis = self.analyzer.analyze(&clip.path).await?;
        let analysis_time = analysis_start.elapsed();

        info!("💾 Step 3/3: saving record");
        let record = self
            .store
            .create(NewIntro::new(clip_request, submitter, analysis))
            .await?;

        Ok((record, analysis_time))
    }
}
