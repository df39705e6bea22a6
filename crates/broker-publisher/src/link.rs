//! 브로커 와이어 추상화
//!
//! [`BrokerLink`] trait은 AMQP 와이어 동사(연결, 프로비저닝 RPC,
//! 토폴로지 선언/해제, 발행, 종료)를 추상화합니다. 프로덕션 코드는
//! [`AmqpLink`](crate::amqp::AmqpLink)를 사용하고, 테스트는 스크립트된
//! 가짜 링크로 모든 상태 전이를 네트워크 없이 검증합니다.
//!
//! # 구조
//!
//! ```text
//! ┌───────────────────┐
//! │ ReliablePublisher │
//! └─────────┬─────────┘
//!           │
//!           ▼
//!    ┌────────────┐
//!    │ BrokerLink │ (trait)
//!    └────────────┘
//!        │      │
//!        ▼      ▼
//!   ┌────────┐ ┌──────┐
//!   │AmqpLink│ │ Mock │
//!   └───┬────┘ └──────┘
//!       │
//!       ▼
//!   AMQP broker
//! ```
//!
//! # 이벤트 흐름
//!
//! `connect()`는 이번 에폭의 [`LinkEvent`] 수신 채널을 반환합니다.
//! 전달 확인(ack/nack)과 연결 종료가 이 채널로 흘러 들어오며,
//! 발행자는 이를 `tokio::select!`로 레코드 입력과 다중화합니다.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use logpost_core::record::Record;

use crate::config::PublisherConfig;
use crate::error::PublishPipelineError;

/// 브로커가 비동기로 보내오는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// 전달 확인 (긍정)
    Ack {
        /// 전달 태그
        tag: u64,
        /// true면 해당 태그 이하 전체를 확인
        multiple: bool,
    },
    /// 전달 확인 (부정)
    Nack {
        /// 전달 태그
        tag: u64,
        /// true면 해당 태그 이하 전체를 확인
        multiple: bool,
    },
    /// 연결 또는 채널이 닫힘
    Closed {
        /// 종료 사유
        reason: String,
    },
}

/// 프로비저닝 핸드셰이크 요청 본문
///
/// 기본 exchange로 프로비저닝 queue에 발행되는 JSON입니다.
/// 브로커 측 컨슈머가 이 정보로 소비 토폴로지를 준비합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// 발행 대상 exchange 이름
    pub exchange: String,
    /// exchange 유형
    pub exchange_type: String,
    /// 바인딩할 queue 이름
    pub queue: String,
    /// 라우팅 키
    pub routing_key: String,
}

impl ProvisionRequest {
    /// 발행 설정에서 요청 본문을 만듭니다.
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            exchange: config.exchange.clone(),
            exchange_type: config.exchange_type.clone(),
            queue: config.queue.clone(),
            routing_key: config.routing_key.clone(),
        }
    }
}

/// AMQP 와이어 동사를 추상화하는 trait
///
/// 모든 브로커 호출이 이 trait을 거치므로 발행자의 연결 상태 기계를
/// 가짜 링크로 검증할 수 있습니다. `Send + Sync + 'static`이어서
/// 비동기 컨텍스트 간 안전하게 공유됩니다.
///
/// # 구현체
///
/// - [`AmqpLink`](crate::amqp::AmqpLink): lapin 기반 프로덕션 구현
/// - `MockBrokerLink`: 설정 가능한 응답을 반환하는 테스트 구현 (테스트 전용)
///
/// # 전달 태그
///
/// `publish()`가 반환하는 전달 태그는 연결(에폭)마다 1부터 시작해
/// 발행 순서대로 증가합니다. 같은 에폭의 확인 이벤트는 이 태그를
/// 기준으로 해소됩니다.
pub trait BrokerLink: Send + Sync + 'static {
    /// 새 연결을 수립하고 이번 에폭의 이벤트 수신 채널을 반환합니다.
    ///
    /// 기존 연결이 있으면 대체됩니다. 전달 태그 카운터는 연결마다
    /// 1부터 다시 시작합니다.
    ///
    /// # Errors
    ///
    /// 연결 수립에 실패하면 `PublishPipelineError::Connect`를 반환합니다.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<LinkEvent>, PublishPipelineError>> + Send;

    /// 프로비저닝 핸드셰이크를 수행합니다.
    ///
    /// 짧은 수명의 제어 채널에서 배타적 서버 명명 응답 queue를 만들고,
    /// 요청을 기본 exchange로 발행한 뒤, 상관 ID가 일치하는 응답이
    /// 도착할 때까지 소비합니다. 상관 ID가 다른 응답은 버립니다.
    ///
    /// # Errors
    ///
    /// RPC 수행에 실패하면 `PublishPipelineError::Provision`을 반환합니다.
    fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> impl Future<Output = Result<(), PublishPipelineError>> + Send;

    /// exchange/queue/binding을 멱등 선언하고 전달 확인 모드를 켭니다.
    ///
    /// # Errors
    ///
    /// 선언 또는 confirm 모드 활성화에 실패하면
    /// `PublishPipelineError::Topology`를 반환합니다.
    fn setup_topology(&self) -> impl Future<Output = Result<(), PublishPipelineError>> + Send;

    /// 레코드 하나를 발행하고 부여된 전달 태그를 반환합니다.
    ///
    /// 본문은 레코드의 JSON 직렬화이며, 전달 확인이 요청됩니다.
    ///
    /// # Errors
    ///
    /// 직렬화 실패는 `Serialize`, 발행 실패는 `Publish`를 반환합니다.
    fn publish(
        &self,
        record: &Record,
    ) -> impl Future<Output = Result<u64, PublishPipelineError>> + Send;

    /// 토폴로지를 해체합니다: binding 해제, queue 삭제(비어 있을 때만),
    /// exchange 삭제. 연결이 없으면 아무것도 하지 않습니다.
    ///
    /// # Errors
    ///
    /// 해체 단계가 실패하면 `PublishPipelineError::Topology`를 반환합니다.
    fn unwind_topology(&self) -> impl Future<Output = Result<(), PublishPipelineError>> + Send;

    /// 채널과 연결을 닫습니다. 멱등이며, 연결이 없으면 아무것도 하지
    /// 않습니다.
    ///
    /// # Errors
    ///
    /// 종료 프레임 교환에 실패하면 `PublishPipelineError::Connect`를
    /// 반환합니다.
    fn close(&self) -> impl Future<Output = Result<(), PublishPipelineError>> + Send;
}
