#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod plugin;
pub mod record;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{BrokerError, ConfigError, LogpostError, PipelineError, PluginError, TailError};

// 설정
pub use config::LogpostConfig;

// 이벤트
pub use event::{Event, EventMetadata, RecordEvent};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 플러그인
pub use plugin::{DynPlugin, Plugin, PluginInfo, PluginRegistry, PluginState, PluginType};

// 레코드
pub use record::{RESERVED_LINE_KEY, Record};
