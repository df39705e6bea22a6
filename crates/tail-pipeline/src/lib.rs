#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`rule`]: YAML 필터 규칙 로딩과 첫-매칭-승리 분류 체인
//! - [`buffer`]: 바이트 청크를 라인 레코드로 재조립하는 라인 버퍼
//! - [`tailer`]: 파일 하나의 읽기 핸들/오프셋 관리와 증분 읽기
//! - [`watcher`]: 파일시스템 이벤트 구독과 테일러 디스패치
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! OS events -> WatchAdapter -> FileTailer -> LineBuffer -> FilterChain -> RecordEvent
//!      |            |              |             |              |
//!   notify     dispatch table  offset/handle  carry+split   first match wins
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rule;
pub mod tailer;
pub mod watcher;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{TailPipeline, TailPipelineBuilder};

// 설정
pub use config::{TailPipelineConfig, TailPipelineConfigBuilder};

// 에러
pub use error::TailPipelineError;

// 규칙
pub use rule::{FileRules, FilterChain, Outcome, RuleAction, RuleSet, RuleSpec};

// 버퍼/테일러
pub use buffer::LineBuffer;
pub use tailer::FileTailer;

// 감시
pub use watcher::{NotifyWatchSource, PathEvent, SubscriptionId, WatchAdapter, WatchSource};
