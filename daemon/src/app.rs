use anyhow::Context;
use std::future::Future;

use tempsense_common::sensor::Sensor;
use tempsense_common::telemetry::Sink;
use tempsense_model::SensorSource;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;

/// Our App struct that wires the configured sensor and sink into a pipeline and hands it to the
/// scheduler.
///
/// The configuration has been validated by the time an App exists. Setting up the sink is the
/// last thing that can fail; once the scheduler runs nothing ends the process except `shutdown`.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the App with the sensor named in the configuration.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        log::info!("Sensor: {}", self.config.sensor);
        let sensor = Sensor::from_config(&self.config.sensor);
        self.run_with(sensor, shutdown).await
    }

    /// Run the App with the given sensor until `shutdown` resolves.
    pub async fn run_with<S: SensorSource>(
        self,
        sensor: S,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        for line in self.startup_summary() {
            log::info!("{line}");
        }

        // Connect the sink before the first tick, a sink that cannot be set up is fatal.
        let sink = Sink::connect(&self.config.sink)
            .await
            .context("failed to set up the telemetry sink")?;

        let mut pipeline = Pipeline::new(sensor, sink, self.config.entity_id.clone());
        Scheduler::new(self.config.interval())
            .run(&mut pipeline, shutdown)
            .await;

        pipeline.into_sink().close().await;
        Ok(())
    }

    /// Startup log lines that hold for any sensor handed to `run_with`.
    fn startup_summary(&self) -> [String; 2] {
        [
            format!("Sink: {}", self.config.sink),
            format!("Interval: {:?}", self.config.interval()),
        ]
    }
}
