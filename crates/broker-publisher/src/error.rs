//! 발행 파이프라인 에러 타입
//!
//! [`PublishPipelineError`]는 발행 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<PublishPipelineError> for LogpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logpost_core::error::{BrokerError, LogpostError};

/// 발행 파이프라인 도메인 에러
///
/// 브로커 연결, 프로비저닝 핸드셰이크, 토폴로지 선언/해제, 메시지 발행,
/// 설정 에러 등 발행 파이프라인 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum PublishPipelineError {
    /// 브로커 연결 수립 실패
    #[error("connect error: {0}")]
    Connect(String),

    /// 프로비저닝 핸드셰이크 실패 (RPC 오류 또는 응답 시간 초과)
    #[error("provision error: {0}")]
    Provision(String),

    /// 토폴로지 선언/해제 실패 (exchange/queue/binding)
    #[error("topology error: {0}")]
    Topology(String),

    /// 메시지 발행 실패
    #[error("publish error: {0}")]
    Publish(String),

    /// 브로커 링크가 닫힘 (연결 유실)
    #[error("link closed: {0}")]
    LinkClosed(String),

    /// 레코드 직렬화 실패
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<PublishPipelineError> for LogpostError {
    fn from(err: PublishPipelineError) -> Self {
        match &err {
            PublishPipelineError::Connect(_)
            | PublishPipelineError::Provision(_)
            | PublishPipelineError::LinkClosed(_) => {
                LogpostError::Broker(BrokerError::Connection(err.to_string()))
            }
            PublishPipelineError::Topology(_) => {
                LogpostError::Broker(BrokerError::Topology(err.to_string()))
            }
            PublishPipelineError::Publish(_)
            | PublishPipelineError::Serialize(_)
            | PublishPipelineError::Config { .. }
            | PublishPipelineError::Channel(_) => {
                LogpostError::Broker(BrokerError::Publish(err.to_string()))
            }
        }
    }
}
