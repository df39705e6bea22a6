//! Broker publisher module initialization.
//!
//! Converts `LogpostConfig.broker` into a `PublisherConfig`, creates the
//! lapin-backed AMQP link, builds the `ReliablePublisher`, and wraps it
//! in a [`PipelineModule`].
//!
//! # Channel Wiring
//!
//! ```text
//! tail-pipeline --RecordEvent--> record_rx --> ReliablePublisher --> AMQP broker
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use logpost_core::config::LogpostConfig;
use logpost_core::event::RecordEvent;
use logpost_core::plugin::{PluginInfo, PluginType};

use logpost_publish::{AmqpLink, PublisherConfig, ReliablePublisher, ReliablePublisherBuilder};

use super::PipelineModule;

/// Initialize the broker publisher module.
///
/// Returns `None` if the broker publisher is disabled in configuration.
/// No network connection is attempted here; the publisher connects when
/// started.
///
/// # Arguments
///
/// * `config` - The full logpost configuration
/// * `record_rx` - Receiver for RecordEvents from the tail pipeline
///
/// # Returns
///
/// * `Ok(Some(PipelineModule))` - Publisher initialized and ready to start
/// * `Ok(None)` - Module disabled in configuration
/// * `Err(_)` - Initialization failed
pub fn init(
    config: &LogpostConfig,
    record_rx: mpsc::Receiver<RecordEvent>,
) -> Result<Option<PipelineModule<ReliablePublisher<AmqpLink>>>> {
    if !config.broker.enabled {
        tracing::info!("broker publisher disabled in configuration");
        return Ok(None);
    }

    tracing::info!(
        host = %config.broker.host,
        port = config.broker.port,
        exchange = %config.broker.exchange,
        "initializing broker publisher"
    );

    let publisher_config = PublisherConfig::from_core(&config.broker);
    let link = Arc::new(AmqpLink::new(publisher_config.clone()));

    let (publisher, _) = ReliablePublisherBuilder::new()
        .config(publisher_config)
        .broker_link(link)
        .record_receiver(record_rx)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build broker publisher: {}", e))?;

    let info = PluginInfo {
        name: "broker-publisher".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        description: "Publishes classified records to AMQP with delivery confirmation".to_owned(),
        plugin_type: PluginType::Publisher,
    };

    Ok(Some(PipelineModule::new(info, publisher)))
}
