//! Module initialization and plugin wrapping.
//!
//! Each logpost pipeline crate exposes a builder that produces a type
//! implementing [`Pipeline`]. The daemon wraps every built pipeline in a
//! [`PipelineModule`], which adds the [`Plugin`] lifecycle (metadata,
//! `Created -> Initialized -> Running -> Stopped` states) expected by the
//! [`PluginRegistry`](logpost_core::plugin::PluginRegistry).

pub mod publish;
pub mod tail;

use logpost_core::error::LogpostError;
use logpost_core::pipeline::{HealthStatus, Pipeline};
use logpost_core::plugin::{Plugin, PluginInfo, PluginState};

/// Adapter that turns any [`Pipeline`] into a [`Plugin`].
///
/// Pipelines are fully constructed by their builders before registration,
/// so `init()` is a pure state transition. `start()`/`stop()` delegate to
/// the pipeline and record `Failed` when the underlying call errors, so
/// the registry's state report stays truthful after a partial startup.
pub struct PipelineModule<P: Pipeline> {
    info: PluginInfo,
    state: PluginState,
    pipeline: P,
}

impl<P: Pipeline> PipelineModule<P> {
    /// Wrap a built pipeline with plugin metadata.
    pub fn new(info: PluginInfo, pipeline: P) -> Self {
        Self {
            info,
            state: PluginState::Created,
            pipeline,
        }
    }

    /// Access the wrapped pipeline (used by tests for assertions).
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }
}

impl<P: Pipeline> Plugin for PipelineModule<P> {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), LogpostError> {
        self.state = PluginState::Initialized;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), LogpostError> {
        match self.pipeline.start().await {
            Ok(()) => {
                self.state = PluginState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = PluginState::Failed;
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        match self.pipeline.stop().await {
            Ok(()) => {
                self.state = PluginState::Stopped;
                Ok(())
            }
            Err(e) => {
                self.state = PluginState::Failed;
                Err(e)
            }
        }
    }

    async fn health_check(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }
}
