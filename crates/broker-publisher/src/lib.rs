#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`link`]: 브로커 세션 추상화 trait과 링크 이벤트 타입
//! - [`amqp`]: lapin 기반 AMQP 0.9.1 링크 구현
//! - [`ledger`]: 전달 태그 추적과 에폭 관리 원장
//! - [`publisher`]: 신뢰 발행자 (Pipeline trait 구현, 재연결 관리)
//! - [`config`]: 발행 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RecordEvent -> ReliablePublisher -> BrokerLink -> AMQP broker
//!      |               |                  |
//!   mpsc 채널     DeliveryLedger    LinkEvent::{Ack, Nack, Closed}
//! ```

pub mod amqp;
pub mod config;
pub mod error;
pub mod ledger;
pub mod link;
pub mod publisher;

// --- 주요 타입 re-export ---

// 발행자
pub use publisher::{ConnectionState, ReliablePublisher, ReliablePublisherBuilder};

// 설정
pub use config::{PublisherConfig, PublisherConfigBuilder};

// 에러
pub use error::PublishPipelineError;

// 링크
pub use amqp::AmqpLink;
pub use link::{BrokerLink, LinkEvent, ProvisionRequest};

// 원장
pub use ledger::DeliveryLedger;
