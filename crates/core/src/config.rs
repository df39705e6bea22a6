//! 설정 관리 — logpost.toml 파싱 및 런타임 설정
//!
//! [`LogpostConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGPOST_BROKER_HOST=mq.internal` 형식)
//! 3. 설정 파일 (`logpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logpost_core::error::LogpostError> {
//! use logpost_core::config::LogpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogpostConfig::load("logpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogpostError};

/// Logpost 통합 설정
///
/// `logpost.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// tail 파이프라인 설정
    #[serde(default)]
    pub tail: TailConfig,
    /// 브로커 발행 설정
    #[serde(default)]
    pub broker: BrokerConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogpostError> {
        toml::from_str(toml_str).map_err(|e| {
            LogpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGPOST_{SECTION}_{FIELD}`
    /// 예: `LOGPOST_BROKER_HOST=mq.internal`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "LOGPOST_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "LOGPOST_GENERAL_PID_FILE");

        // Tail
        override_bool(&mut self.tail.enabled, "LOGPOST_TAIL_ENABLED");
        override_string(&mut self.tail.filter_file, "LOGPOST_TAIL_FILTER_FILE");
        override_usize(
            &mut self.tail.channel_capacity,
            "LOGPOST_TAIL_CHANNEL_CAPACITY",
        );
        override_usize(&mut self.tail.max_line_bytes, "LOGPOST_TAIL_MAX_LINE_BYTES");

        // Broker
        override_bool(&mut self.broker.enabled, "LOGPOST_BROKER_ENABLED");
        override_string(&mut self.broker.host, "LOGPOST_BROKER_HOST");
        override_u16(&mut self.broker.port, "LOGPOST_BROKER_PORT");
        override_string(&mut self.broker.username, "LOGPOST_BROKER_USERNAME");
        override_string(&mut self.broker.password, "LOGPOST_BROKER_PASSWORD");
        override_string(&mut self.broker.vhost, "LOGPOST_BROKER_VHOST");
        override_string(&mut self.broker.exchange, "LOGPOST_BROKER_EXCHANGE");
        override_string(
            &mut self.broker.exchange_type,
            "LOGPOST_BROKER_EXCHANGE_TYPE",
        );
        override_string(&mut self.broker.queue, "LOGPOST_BROKER_QUEUE");
        override_string(&mut self.broker.routing_key, "LOGPOST_BROKER_ROUTING_KEY");
        override_bool(&mut self.broker.provision, "LOGPOST_BROKER_PROVISION");
        override_string(
            &mut self.broker.provision_queue,
            "LOGPOST_BROKER_PROVISION_QUEUE",
        );
        override_u64(
            &mut self.broker.heartbeat_secs,
            "LOGPOST_BROKER_HEARTBEAT_SECS",
        );
        override_u64(
            &mut self.broker.reconnect_delay_secs,
            "LOGPOST_BROKER_RECONNECT_DELAY_SECS",
        );
        override_u64(
            &mut self.broker.connect_timeout_secs,
            "LOGPOST_BROKER_CONNECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.broker.provision_timeout_secs,
            "LOGPOST_BROKER_PROVISION_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.broker.teardown_timeout_secs,
            "LOGPOST_BROKER_TEARDOWN_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGPOST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGPOST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGPOST_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGPOST_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogpostError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // tail 검증
        if self.tail.enabled {
            if self.tail.filter_file.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "tail.filter_file".to_owned(),
                    reason: "filter_file must not be empty when tail is enabled".to_owned(),
                }
                .into());
            }

            if self.tail.channel_capacity == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "tail.channel_capacity".to_owned(),
                    reason: "channel_capacity must be greater than 0".to_owned(),
                }
                .into());
            }

            if self.tail.max_line_bytes == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "tail.max_line_bytes".to_owned(),
                    reason: "max_line_bytes must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        // broker 검증
        if self.broker.enabled {
            if self.broker.host.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "broker.host".to_owned(),
                    reason: "host must not be empty when broker is enabled".to_owned(),
                }
                .into());
            }

            if self.broker.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "broker.port".to_owned(),
                    reason: "port must not be 0".to_owned(),
                }
                .into());
            }

            let valid_exchange_types = ["direct", "fanout", "topic", "headers"];
            if !valid_exchange_types.contains(&self.broker.exchange_type.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "broker.exchange_type".to_owned(),
                    reason: format!("must be one of: {}", valid_exchange_types.join(", ")),
                }
                .into());
            }

            if self.broker.queue.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "broker.queue".to_owned(),
                    reason: "queue must not be empty when broker is enabled".to_owned(),
                }
                .into());
            }

            if self.broker.provision && self.broker.provision_queue.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "broker.provision_queue".to_owned(),
                    reason: "provision_queue must not be empty when provision is enabled"
                        .to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/logpost".to_owned(),
            pid_file: "/var/run/logpost.pid".to_owned(),
        }
    }
}

/// tail 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 필터 규칙 YAML 파일 경로 (감시 대상 파일 목록 포함)
    pub filter_file: String,
    /// 레코드 이벤트 채널 용량
    pub channel_capacity: usize,
    /// 라인 최대 길이 (바이트, 초과 라인은 버려짐)
    pub max_line_bytes: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_file: "/etc/logpost/filters.yml".to_owned(),
            channel_capacity: 1024,
            max_line_bytes: 64 * 1024, // 64KB
        }
    }
}

/// 브로커 발행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 브로커 호스트
    pub host: String,
    /// 브로커 포트
    pub port: u16,
    /// 접속 계정
    pub username: String,
    /// 접속 비밀번호
    pub password: String,
    /// 가상 호스트
    pub vhost: String,
    /// 발행 대상 exchange 이름
    pub exchange: String,
    /// exchange 유형 (direct, fanout, topic, headers)
    pub exchange_type: String,
    /// 바인딩할 queue 이름
    pub queue: String,
    /// 라우팅 키
    pub routing_key: String,
    /// 연결 전 프로비저닝 RPC 수행 여부
    pub provision: bool,
    /// 프로비저닝 요청을 보낼 queue 이름
    pub provision_queue: String,
    /// 하트비트 주기 (초)
    pub heartbeat_secs: u64,
    /// 연결 끊김 후 재연결 대기 시간 (초)
    pub reconnect_delay_secs: u64,
    /// 연결 수립 시간 제한 (초)
    pub connect_timeout_secs: u64,
    /// 프로비저닝 응답 대기 시간 제한 (초)
    pub provision_timeout_secs: u64,
    /// 토폴로지 해체/연결 종료 시간 제한 (초)
    pub teardown_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_owned(),
            port: 5672,
            username: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
            exchange: "logs".to_owned(),
            exchange_type: "direct".to_owned(),
            queue: "logpost".to_owned(),
            routing_key: "logpost".to_owned(),
            provision: false,
            provision_queue: "rpc_queue".to_owned(),
            heartbeat_secs: 60,
            reconnect_delay_secs: 5,
            connect_timeout_secs: 10,
            provision_timeout_secs: 10,
            teardown_timeout_secs: 5,
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 메트릭 HTTP 리스너 주소
    pub listen_addr: String,
    /// 메트릭 HTTP 리스너 포트
    pub port: u16,
    /// 메트릭 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9099,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
