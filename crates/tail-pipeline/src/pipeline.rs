//! 테일 파이프라인 -- 어댑터 묶음의 생명주기 관리
//!
//! [`TailPipeline`]은 규칙 파일에 선언된 파일마다 [`WatchAdapter`]
//! 태스크를 하나씩 띄우고, 모든 어댑터가 공유하는 레코드 채널의
//! 송신단을 나눠줍니다. core의 [`Pipeline`] trait을 구현하여 데몬이
//! 시작/정지/상태 확인을 일괄 수행할 수 있습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logpost_core::error::{LogpostError, PipelineError};
use logpost_core::event::RecordEvent;
use logpost_core::pipeline::{HealthStatus, Pipeline};

use crate::config::TailPipelineConfig;
use crate::error::TailPipelineError;
use crate::rule::RuleSet;
use crate::watcher::{WatchAdapter, WatchSource};

/// 정지 시 태스크 종료를 기다리는 최대 시간
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 파이프라인 내부 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 생성 직후, 아직 시작 전
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 파일 테일링 파이프라인
///
/// 규칙 파일의 각 항목마다 감시 구독과 테일러를 묶은 어댑터를
/// 실행합니다. 방출된 레코드는 공유 채널로 모입니다.
pub struct TailPipeline<W: WatchSource> {
    config: TailPipelineConfig,
    watch_source: Arc<W>,
    record_tx: mpsc::Sender<RecordEvent>,
    state: PipelineState,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    /// 핸들을 연 파일 수 (어댑터들이 갱신)
    open_files: Arc<AtomicUsize>,
    /// 규칙 파일에 선언된 추적 대상 수
    tracked_files: usize,
}

impl<W: WatchSource> TailPipeline<W> {
    /// 빌더를 생성합니다.
    pub fn builder() -> TailPipelineBuilder<W> {
        TailPipelineBuilder::new()
    }

    /// 현재 상태 이름 (로그/진단용)
    pub fn state_name(&self) -> &'static str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 추적 대상 파일 수
    pub fn tracked_files(&self) -> usize {
        self.tracked_files
    }

    /// 현재 핸들이 열린 파일 수
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Relaxed)
    }
}

impl<W: WatchSource> Pipeline for TailPipeline<W> {
    async fn start(&mut self) -> Result<(), LogpostError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let rules = RuleSet::load(&self.config.filter_file)
            .await
            .map_err(|e| PipelineError::InitFailed(format!("rule load failed: {e}")))?;
        let chains = rules
            .build_chains()
            .map_err(|e| PipelineError::InitFailed(format!("rule compile failed: {e}")))?;

        info!(
            filter_file = %self.config.filter_file,
            files = chains.len(),
            rules = rules.rule_count(),
            "starting tail pipeline"
        );

        self.cancel = CancellationToken::new();
        self.open_files.store(0, Ordering::Relaxed);
        self.tracked_files = chains.len();

        let mut adapters = Vec::with_capacity(chains.len());
        for (path, chain) in chains {
            let adapter = WatchAdapter::bind(
                Arc::clone(&self.watch_source),
                path.clone(),
                chain,
                self.config.max_line_bytes,
                self.config.watch_event_capacity,
                self.record_tx.clone(),
                Arc::clone(&self.open_files),
            )
            .await
            .map_err(|e| {
                PipelineError::InitFailed(format!("bind failed for {}: {e}", path.display()))
            })?;
            adapters.push(adapter);
        }

        for adapter in adapters {
            debug!(path = %adapter.path().display(), "spawning watch adapter");
            self.tasks.push(tokio::spawn(adapter.run(self.cancel.clone())));
        }

        self.state = PipelineState::Running;
        info!(files = self.tracked_files, "tail pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping tail pipeline");
        self.cancel.cancel();

        for mut task in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if e.is_panic() {
                        error!(error = %e, "watch adapter task panicked");
                    }
                }
                Err(_) => {
                    warn!("watch adapter did not stop in time, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        self.open_files.store(0, Ordering::Relaxed);
        self.state = PipelineState::Stopped;
        info!("tail pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.tracked_files > 0 && self.open_files() == 0 {
                    HealthStatus::Degraded("no tracked file currently open".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            _ => HealthStatus::Unhealthy(format!("pipeline is {}", self.state_name())),
        }
    }
}

/// 테일 파이프라인 빌더
///
/// 레코드 송신자를 지정하지 않으면 내부 채널을 만들어 수신단을
/// 돌려줍니다. 외부 송신자를 지정하면 수신단은 `None`입니다.
pub struct TailPipelineBuilder<W: WatchSource> {
    config: TailPipelineConfig,
    watch_source: Option<Arc<W>>,
    record_tx: Option<mpsc::Sender<RecordEvent>>,
}

impl<W: WatchSource> TailPipelineBuilder<W> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: TailPipelineConfig::default(),
            watch_source: None,
            record_tx: None,
        }
    }

    /// 설정을 지정합니다.
    pub fn config(mut self, config: TailPipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 감시 소스를 지정합니다 (필수).
    pub fn watch_source(mut self, source: Arc<W>) -> Self {
        self.watch_source = Some(source);
        self
    }

    /// 외부 레코드 송신자를 지정합니다.
    pub fn record_sender(mut self, sender: mpsc::Sender<RecordEvent>) -> Self {
        self.record_tx = Some(sender);
        self
    }

    /// 파이프라인을 생성합니다.
    ///
    /// 내부 채널을 만든 경우 수신단을 함께 반환합니다.
    #[allow(clippy::type_complexity)]
    pub fn build(
        self,
    ) -> Result<(TailPipeline<W>, Option<mpsc::Receiver<RecordEvent>>), TailPipelineError> {
        self.config.validate()?;

        let watch_source = self.watch_source.ok_or_else(|| TailPipelineError::Config {
            field: "watch_source".to_owned(),
            reason: "watch source is required".to_owned(),
        })?;

        let (record_tx, record_rx) = match self.record_tx {
            Some(sender) => (sender, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                (tx, Some(rx))
            }
        };

        let pipeline = TailPipeline {
            config: self.config,
            watch_source,
            record_tx,
            state: PipelineState::Initialized,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            open_files: Arc::new(AtomicUsize::new(0)),
            tracked_files: 0,
        };
        Ok((pipeline, record_rx))
    }
}

impl<W: WatchSource> Default for TailPipelineBuilder<W> {
    fn default() -> Self {
        Self::new()
    }
}
