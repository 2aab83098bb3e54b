use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::BuildMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: BuildMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: BuildMonitor::new(monitor_enabled),
        }
    }

    /// Extract, transform and load, then always clean up.
    ///
    /// A cleanup failure is logged but never masks the outcome of the run.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("--- Starting card database build ---");

        let outcome = self.run_phases().await;

        if let Err(e) = self.pipeline.cleanup().await {
            tracing::warn!("🧹 Cleanup failed: {}", e);
        }
        self.monitor.log_summary();

        match &outcome {
            Ok(path) => tracing::info!("--- Card database build completed: {} ---", path),
            Err(e) => tracing::error!("An error occurred during the build process: {}", e),
        }
        outcome
    }

    async fn run_phases(&self) -> Result<String> {
        tracing::info!("Extracting data...");
        let raw_cards = self.pipeline.extract().await?;
        tracing::info!("Extracted {} cards", raw_cards.len());
        self.monitor.log_phase("Extract");

        tracing::info!("Transforming data...");
        let transformed = self.pipeline.transform(raw_cards).await?;
        tracing::info!(
            "Transformed {} cards ({} skipped)",
            transformed.rows.len(),
            transformed.skipped
        );
        self.monitor.log_phase("Transform");

        tracing::info!("Loading data...");
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.log_phase("Load");

        Ok(output_path)
    }
}
