//! 파이프라인 trait — 모듈 생명주기와 상태 보고 인터페이스
//!
//! 각 모듈(tail 파이프라인, 브로커 발행기)은 [`Pipeline`]을 구현하여
//! 데몬이 동일한 방식으로 시작/정지/상태 확인을 수행할 수 있게 합니다.
//! 타입을 지운 채 다뤄야 하는 자리(모듈 레지스트리 등)에서는
//! [`DynPipeline`]을 사용합니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::LogpostError;

/// dyn 호환 trait에서 사용하는 박싱된 Future 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작하지만 주의 필요 (사유 포함)
    Degraded(String),
    /// 동작 불가 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 모듈 생명주기 trait
///
/// 시작/정지는 상태를 전이시키므로 `&mut self`를 받습니다.
/// 이미 실행 중인 모듈의 `start`는 [`PipelineError::AlreadyRunning`],
/// 실행 중이 아닌 모듈의 `stop`은 [`PipelineError::NotRunning`]을
/// 반환해야 합니다.
///
/// [`PipelineError::AlreadyRunning`]: crate::error::PipelineError::AlreadyRunning
/// [`PipelineError::NotRunning`]: crate::error::PipelineError::NotRunning
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 모듈을 정지하고 리소스를 정리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 현재 건강 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn 호환 파이프라인 trait
///
/// [`Pipeline`]은 RPITIT를 사용하므로 trait object로 만들 수 없습니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Box<dyn DynPipeline>`으로
/// 서로 다른 모듈을 한 컬렉션에 담을 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 현재 건강 상태를 보고합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}
