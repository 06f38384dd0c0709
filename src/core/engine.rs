use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ZoneEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ZoneEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting zone analysis");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting inputs...");
        let inputs = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} POIs and {} isochrone rings",
            inputs.pois.len(),
            inputs.rings.len()
        );
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Resolving zones...");
        let analysis = self.pipeline.transform(inputs).await?;
        tracing::info!(
            "Resolved {} regions ({} failures recorded)",
            analysis.zones.len(),
            analysis.report.len()
        );
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Writing results...");
        let output_path = self.pipeline.load(analysis).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
