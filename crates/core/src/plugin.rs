//! 플러그인 시스템 — 모듈 등록, 생명주기 관리, 동적 확장
//!
//! [`Plugin`] trait은 [`Pipeline`](crate::pipeline::Pipeline)의 상위 추상화로,
//! 모듈 메타데이터와 초기화 단계를 추가합니다.
//!
//! [`PluginRegistry`]는 플러그인의 등록, 해제, 생명주기 관리를 담당합니다.
//!
//! # 생명주기
//! ```text
//! Created → init() → Initialized → start() → Running → stop() → Stopped
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{LogpostError, PluginError};
use crate::pipeline::{BoxFuture, HealthStatus};

// ─── PluginType ──────────────────────────────────────────────────────

/// 플러그인 유형
///
/// 기본 제공 모듈 유형과 사용자 정의 유형을 구분합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    /// 파일 tail 수집/필터 파이프라인
    Tailer,
    /// 브로커 발행기
    Publisher,
    /// 사용자 정의 플러그인
    Custom(String),
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tailer => write!(f, "tailer"),
            Self::Publisher => write!(f, "publisher"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

// ─── PluginInfo ──────────────────────────────────────────────────────

/// 플러그인 메타데이터
///
/// 플러그인 등록 시 고유 이름, 버전, 설명, 유형 정보를 제공합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 플러그인 고유 이름 (예: `"tail-pipeline"`)
    pub name: String,
    /// 플러그인 버전 (semver, 예: `"0.1.0"`)
    pub version: String,
    /// 플러그인 설명
    pub description: String,
    /// 플러그인 유형
    pub plugin_type: PluginType,
}

// ─── PluginState ─────────────────────────────────────────────────────

/// 플러그인 생명주기 상태
///
/// 상태 전환:
/// - `Created` → `init()` → `Initialized`
/// - `Initialized` → `start()` → `Running`
/// - `Running` → `stop()` → `Stopped`
/// - 에러 발생 시 → `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// 생성됨 (init 전)
    Created,
    /// 초기화 완료 (start 가능)
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
    /// 오류 상태
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ─── Plugin Trait ────────────────────────────────────────────────────

/// 모든 모듈이 구현하는 플러그인 trait
///
/// [`Pipeline`](crate::pipeline::Pipeline)의 상위 추상화로,
/// 메타데이터 조회와 초기화 단계를 추가합니다.
///
/// # 생명주기
/// ```text
/// Created → init() → Initialized → start() → Running → stop() → Stopped
/// ```
///
/// # 구현 예시
/// ```ignore
/// struct MyPlugin {
///     info: PluginInfo,
///     state: PluginState,
/// }
///
/// impl Plugin for MyPlugin {
///     fn info(&self) -> &PluginInfo { &self.info }
///     fn state(&self) -> PluginState { self.state }
///
///     async fn init(&mut self) -> Result<(), LogpostError> {
///         self.state = PluginState::Initialized;
///         Ok(())
///     }
///     async fn start(&mut self) -> Result<(), LogpostError> {
///         self.state = PluginState::Running;
///         Ok(())
///     }
///     async fn stop(&mut self) -> Result<(), LogpostError> {
///         self.state = PluginState::Stopped;
///         Ok(())
///     }
///     async fn health_check(&self) -> HealthStatus {
///         HealthStatus::Healthy
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 플러그인을 초기화합니다.
    ///
    /// 리소스 할당, 설정 검증 등을 수행합니다.
    /// `Created` 상태에서만 호출 가능합니다.
    fn init(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 플러그인을 시작합니다.
    ///
    /// `Initialized` 또는 `Stopped` 상태에서만 호출 가능합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 플러그인을 정지합니다.
    ///
    /// `Running` 상태에서만 호출 가능합니다.
    /// Graceful shutdown을 수행합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogpostError>> + Send;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

// ─── DynPlugin Trait ─────────────────────────────────────────────────

/// dyn-compatible 플러그인 trait
///
/// `Plugin` trait은 RPITIT를 사용하므로 `dyn Plugin`이 불가합니다.
/// `DynPlugin`은 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPlugin>>`으로
/// 플러그인을 동적 관리할 수 있게 합니다.
pub trait DynPlugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 플러그인을 초기화합니다.
    fn init(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 플러그인을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 플러그인을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>>;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Plugin을 구현한 타입은 자동으로 DynPlugin도 구현됩니다.
impl<T: Plugin> DynPlugin for T {
    fn info(&self) -> &PluginInfo {
        Plugin::info(self)
    }

    fn state(&self) -> PluginState {
        Plugin::state(self)
    }

    fn init(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Plugin::init(self))
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Plugin::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogpostError>> {
        Box::pin(Plugin::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Plugin::health_check(self))
    }
}

// ─── PluginRegistry ──────────────────────────────────────────────────

/// 플러그인 레지스트리
///
/// 플러그인의 등록, 해제, 생명주기 관리를 담당합니다.
/// 등록 순서가 보존되며, 생산자를 먼저 등록하고 소비자를 나중에 등록합니다.
///
/// # 사용 예시
/// ```ignore
/// let mut registry = PluginRegistry::new();
/// registry.register(Box::new(tail_plugin))?;
/// registry.register(Box::new(publish_plugin))?;
///
/// registry.init_all().await?;
/// registry.start_all().await?;
///
/// // ... 실행 중 ...
///
/// registry.stop_all().await?;
/// ```
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DynPlugin>>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 플러그인을 등록합니다.
    ///
    /// 동일한 이름의 플러그인이 이미 등록되어 있으면 에러를 반환합니다.
    /// 등록 순서가 보존되며, 생산자를 먼저 등록해야 합니다.
    pub fn register(&mut self, plugin: Box<dyn DynPlugin>) -> Result<(), LogpostError> {
        let name = plugin.info().name.clone();
        if self.plugins.iter().any(|p| p.info().name == name) {
            return Err(PluginError::AlreadyRegistered { name }.into());
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// 플러그인을 해제합니다.
    ///
    /// 존재하지 않는 플러그인이면 에러를 반환합니다.
    /// 해제된 플러그인의 소유권을 반환합니다.
    pub fn unregister(&mut self, name: &str) -> Result<Box<dyn DynPlugin>, LogpostError> {
        let pos = self.plugins.iter().position(|p| p.info().name == name);
        match pos {
            Some(idx) => Ok(self.plugins.remove(idx)),
            None => Err(PluginError::NotFound {
                name: name.to_owned(),
            }
            .into()),
        }
    }

    /// 이름으로 플러그인을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn DynPlugin> {
        self.plugins
            .iter()
            .find(|p| p.info().name == name)
            .map(|p| p.as_ref())
    }

    /// 이름으로 플러그인을 가변 조회합니다.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn DynPlugin> {
        for plugin in &mut self.plugins {
            if plugin.info().name == name {
                return Some(&mut **plugin);
            }
        }
        None
    }

    /// 모든 플러그인을 등록 순서대로 초기화합니다.
    ///
    /// 첫 번째 실패 시 즉시 반환합니다 (fail-fast).
    pub async fn init_all(&mut self) -> Result<(), LogpostError> {
        for plugin in &mut self.plugins {
            plugin.init().await?;
        }
        Ok(())
    }

    /// 모든 플러그인을 등록 순서대로 시작합니다.
    ///
    /// 첫 번째 실패 시 즉시 반환합니다 (fail-fast).
    /// 이미 시작된 플러그인은 롤백하지 않으므로, 호출자가 `stop_all`을 호출해야 합니다.
    pub async fn start_all(&mut self) -> Result<(), LogpostError> {
        for plugin in &mut self.plugins {
            plugin.start().await?;
        }
        Ok(())
    }

    /// 모든 플러그인을 등록 순서대로 정지합니다.
    ///
    /// 생산자가 먼저 정지하여 소비자가 잔여 이벤트를 드레인할 수 있습니다.
    /// 개별 플러그인 정지 실패 시에도 나머지 플러그인의 정지를 계속합니다.
    /// 모든 에러를 수집하여 반환합니다.
    pub async fn stop_all(&mut self) -> Result<(), LogpostError> {
        let mut errors = Vec::new();
        for plugin in &mut self.plugins {
            if let Err(e) = plugin.stop().await {
                errors.push(format!("{}: {}", plugin.info().name, e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PluginError::StopFailed(errors.join("; ")).into())
        }
    }

    /// 등록된 플러그인 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 등록된 모든 플러그인의 정보를 반환합니다.
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    /// 모든 플러그인의 건강 상태를 조회합니다.
    pub async fn health_check_all(&self) -> Vec<(String, PluginState, HealthStatus)> {
        let mut statuses = Vec::new();
        for plugin in &self.plugins {
            let name = plugin.info().name.clone();
            let state = plugin.state();
            let health = plugin.health_check().await;
            statuses.push((name, state, health));
        }
        statuses
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
