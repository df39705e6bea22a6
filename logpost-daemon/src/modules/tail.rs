//! Tail pipeline module initialization.
//!
//! Converts `LogpostConfig.tail` into a `TailPipelineConfig`, builds the
//! `TailPipeline` against the real notify-backed watch source, and wraps
//! it in a [`PipelineModule`].
//!
//! # Channel Wiring
//!
//! ```text
//! TailPipeline --RecordEvent--> record_tx --> broker-publisher
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use logpost_core::config::LogpostConfig;
use logpost_core::event::RecordEvent;
use logpost_core::plugin::{PluginInfo, PluginType};

use logpost_tail::{NotifyWatchSource, TailPipeline, TailPipelineBuilder, TailPipelineConfig};

use super::PipelineModule;

/// Initialize the tail pipeline module.
///
/// Returns `None` if the tail pipeline is disabled in configuration.
///
/// # Arguments
///
/// * `config` - The full logpost configuration
/// * `record_tx` - Sender for RecordEvents (consumed by the broker publisher)
///
/// # Returns
///
/// * `Ok(Some(PipelineModule))` - Pipeline initialized and ready to start
/// * `Ok(None)` - Module disabled in configuration
/// * `Err(_)` - Initialization failed (rule file missing, watcher setup)
pub fn init(
    config: &LogpostConfig,
    record_tx: mpsc::Sender<RecordEvent>,
) -> Result<Option<PipelineModule<TailPipeline<NotifyWatchSource>>>> {
    if !config.tail.enabled {
        tracing::info!("tail pipeline disabled in configuration");
        return Ok(None);
    }

    tracing::info!("initializing tail pipeline");

    let pipeline_config = TailPipelineConfig::from_core(&config.tail);

    let watch_source = Arc::new(
        NotifyWatchSource::new()
            .map_err(|e| anyhow::anyhow!("failed to create filesystem watcher: {}", e))?,
    );

    let (pipeline, _) = TailPipelineBuilder::new()
        .config(pipeline_config)
        .watch_source(watch_source)
        .record_sender(record_tx)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build tail pipeline: {}", e))?;

    let info = PluginInfo {
        name: "tail-pipeline".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        description: "Tails log files, reassembles lines, and classifies them".to_owned(),
        plugin_type: PluginType::Tailer,
    };

    Ok(Some(PipelineModule::new(info, pipeline)))
}
