//! 테일 파이프라인 설정
//!
//! [`TailPipelineConfig`]는 core의 [`TailConfig`](logpost_core::config::TailConfig)를
//! 기반으로 테일 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logpost_core::config::LogpostConfig;
//! use logpost_tail::config::TailPipelineConfig;
//!
//! let core_config = LogpostConfig::default();
//! let config = TailPipelineConfig::from_core(&core_config.tail);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TailPipelineError;

/// 테일 파이프라인 설정
///
/// core의 `TailConfig`에서 파생되며, 파이프라인 내부에서 사용하는
/// 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailPipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 필터 규칙 YAML 파일 경로
    pub filter_file: String,
    /// 레코드 이벤트 채널 용량
    pub channel_capacity: usize,
    /// 라인 최대 길이 (바이트, 초과 라인은 버려짐)
    pub max_line_bytes: usize,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 파일별 감시 이벤트 큐 용량
    pub watch_event_capacity: usize,
}

impl Default for TailPipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_file: "/etc/logpost/filters.yml".to_owned(),
            channel_capacity: 1024,
            max_line_bytes: 64 * 1024,
            watch_event_capacity: 256,
        }
    }
}

impl TailPipelineConfig {
    /// core의 `TailConfig`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &logpost_core::config::TailConfig) -> Self {
        Self {
            enabled: core.enabled,
            filter_file: core.filter_file.clone(),
            channel_capacity: core.channel_capacity,
            max_line_bytes: core.max_line_bytes,
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailPipelineError> {
        const MAX_CHANNEL_CAPACITY: usize = 1_000_000;
        const MAX_LINE_BYTES: usize = 16 * 1024 * 1024; // 16MB
        const MAX_WATCH_EVENT_CAPACITY: usize = 65_536;

        if self.filter_file.is_empty() {
            return Err(TailPipelineError::Config {
                field: "filter_file".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(TailPipelineError::Config {
                field: "channel_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_CHANNEL_CAPACITY),
            });
        }

        if self.max_line_bytes == 0 || self.max_line_bytes > MAX_LINE_BYTES {
            return Err(TailPipelineError::Config {
                field: "max_line_bytes".to_owned(),
                reason: format!("must be 1-{}", MAX_LINE_BYTES),
            });
        }

        if self.watch_event_capacity == 0 || self.watch_event_capacity > MAX_WATCH_EVENT_CAPACITY {
            return Err(TailPipelineError::Config {
                field: "watch_event_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_WATCH_EVENT_CAPACITY),
            });
        }

        Ok(())
    }
}

/// 테일 파이프라인 설정 빌더
#[derive(Default)]
pub struct TailPipelineConfigBuilder {
    config: TailPipelineConfig,
}

impl TailPipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 필터 규칙 파일 경로를 설정합니다.
    pub fn filter_file(mut self, path: impl Into<String>) -> Self {
        self.config.filter_file = path.into();
        self
    }

    /// 레코드 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 라인 최대 길이를 설정합니다.
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.max_line_bytes = bytes;
        self
    }

    /// 감시 이벤트 큐 용량을 설정합니다.
    pub fn watch_event_capacity(mut self, capacity: usize) -> Self {
        self.config.watch_event_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `TailPipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<TailPipelineConfig, TailPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TailPipelineConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = logpost_core::config::TailConfig {
            enabled: false,
            filter_file: "/opt/filters.yml".to_owned(),
            channel_capacity: 512,
            max_line_bytes: 4096,
        };
        let config = TailPipelineConfig::from_core(&core);
        assert!(!config.enabled);
        assert_eq!(config.filter_file, "/opt/filters.yml");
        assert_eq!(config.channel_capacity, 512);
        assert_eq!(config.max_line_bytes, 4096);
        // 확장 필드는 기본값
        assert_eq!(config.watch_event_capacity, 256);
    }

    #[test]
    fn validate_rejects_empty_filter_file() {
        let config = TailPipelineConfig {
            filter_file: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let config = TailPipelineConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_line_limit() {
        let config = TailPipelineConfig {
            max_line_bytes: 17 * 1024 * 1024,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_watch_event_capacity() {
        let config = TailPipelineConfig {
            watch_event_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = TailPipelineConfigBuilder::new()
            .filter_file("/custom/filters.yml")
            .channel_capacity(2048)
            .max_line_bytes(8192)
            .build()
            .unwrap();
        assert_eq!(config.filter_file, "/custom/filters.yml");
        assert_eq!(config.channel_capacity, 2048);
        assert_eq!(config.max_line_bytes, 8192);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = TailPipelineConfigBuilder::new().channel_capacity(0).build();
        assert!(result.is_err());
    }
}
