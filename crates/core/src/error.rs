//! 에러 타입 — 도메인별 에러 정의

/// Logpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 플러그인 생명주기 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// 파일 감시/수집 에러
    #[error("tail error: {0}")]
    Tail(#[from] TailError),

    /// 브로커 송신 에러
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline not running")]
    NotRunning,
}

/// 플러그인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 동일한 이름의 플러그인이 이미 등록됨
    #[error("plugin already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 플러그인을 찾을 수 없음
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// 잘못된 상태에서 생명주기 메서드 호출
    #[error("plugin '{name}' in invalid state: current={current}, expected={expected}")]
    InvalidState {
        name: String,
        current: String,
        expected: String,
    },

    /// 하나 이상의 플러그인 정지 실패 (에러 메시지 목록)
    #[error("plugin stop failed: {0}")]
    StopFailed(String),
}

/// 파일 감시/수집 에러
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// 필터 규칙 로딩/컴파일 실패
    #[error("rule error: {0}")]
    Rule(String),

    /// 파일시스템 감시 실패
    #[error("watch error: {0}")]
    Watch(String),

    /// 파일 읽기/추적 실패
    #[error("collect error: {0}")]
    Collect(String),
}

/// 브로커 송신 에러
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// 연결 수립/유지 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 토폴로지 선언/해제 실패
    #[error("topology error: {0}")]
    Topology(String),

    /// 메시지 발행 실패
    #[error("publish failed: {0}")]
    Publish(String),
}
