//! 신뢰 발행자 -- 연결 상태 기계, 전달 확인 추적, 재연결 관리
//!
//! [`ReliablePublisher`]는 core의 [`Pipeline`] trait을 구현하여
//! `logpost-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! RecordEvent ──mpsc──> 드라이버 태스크
//!                           |
//!                    BrokerLink.publish() ──> 브로커
//!                           |
//!                    DeliveryLedger <──mpsc── LinkEvent::{Ack, Nack, Closed}
//! ```
//!
//! # 연결 상태 전이
//! ```text
//! Disconnected → Connecting    (시작 또는 재연결 예약)
//! Connecting   → Open          (연결 + 프로비저닝 + 토폴로지 + confirm 성공)
//! Open         → Disconnected  (연결 유실; 고정 지연 후 재연결)
//! Open/Connecting → Closing → Disconnected  (명시적 stop)
//! ```
//!
//! 레코드 채널은 세션이 Open일 때만 소비합니다. 연결이 없는 동안
//! 레코드는 유한 채널에 쌓여 수집 파이프라인에 배압을 겁니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logpost_core::error::{LogpostError, PipelineError};
use logpost_core::event::RecordEvent;
use logpost_core::metrics as m;
use logpost_core::pipeline::{HealthStatus, Pipeline};

use crate::config::PublisherConfig;
use crate::error::PublishPipelineError;
use crate::ledger::DeliveryLedger;
use crate::link::{BrokerLink, LinkEvent, ProvisionRequest};

/// 드라이버 태스크 종료 대기 한도
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 브로커 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// 연결 없음
    Disconnected = 0,
    /// 연결 수립 진행 중 (연결/프로비저닝/토폴로지)
    Connecting = 1,
    /// 세션 수립 완료, 발행 가능
    Open = 2,
    /// 명시적 종료 진행 중
    Closing = 3,
}

impl ConnectionState {
    /// 상태명을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// 드라이버 태스크와 파이프라인 핸들이 공유하는 연결 상태
#[derive(Debug)]
struct SharedConnectionState(AtomicU8);

impl SharedConnectionState {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Relaxed))
    }
}

/// 파이프라인 생명주기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 신뢰 발행자 -- 레코드를 브로커로 발행하고 전달 확인을 추적합니다.
///
/// core의 `Pipeline` trait을 구현하여 `logpost-daemon`에서
/// 다른 모듈과 동일한 생명주기(start/stop/health_check)로 관리됩니다.
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use logpost_publish::{AmqpLink, PublisherConfig, ReliablePublisherBuilder};
///
/// let config = PublisherConfig::default();
/// let link = Arc::new(AmqpLink::new(config.clone()));
/// let (mut publisher, record_tx) = ReliablePublisherBuilder::new()
///     .config(config)
///     .broker_link(link)
///     .build()?;
///
/// // Pipeline trait으로 시작
/// publisher.start().await?;
/// ```
pub struct ReliablePublisher<L: BrokerLink> {
    /// 발행 설정
    config: PublisherConfig,
    /// 현재 생명주기 상태
    state: PipelineState,
    /// 브로커 링크 (공유)
    link: Arc<L>,
    /// 레코드 수신 채널 (start에서 드라이버로 이관)
    record_rx: Option<mpsc::Receiver<RecordEvent>>,
    /// 연결 상태 (드라이버와 공유)
    conn_state: Arc<SharedConnectionState>,
    /// 전달 확인 원장 (드라이버와 공유)
    ledger: Arc<DeliveryLedger>,
    /// 발행된 레코드 누계 (에폭과 무관)
    records_published: Arc<AtomicU64>,
    /// 드라이버 취소 토큰
    cancel: CancellationToken,
    /// 백그라운드 태스크 핸들
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl<L: BrokerLink> ReliablePublisher<L> {
    /// 빌더를 생성합니다.
    pub fn builder() -> ReliablePublisherBuilder<L> {
        ReliablePublisherBuilder::new()
    }

    /// 현재 생명주기 상태명을 반환합니다.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 현재 브로커 연결 상태를 반환합니다.
    pub fn connection_state(&self) -> ConnectionState {
        self.conn_state.get()
    }

    /// 발행된 레코드 누계를 반환합니다 (모든 에폭 합산).
    pub fn records_published(&self) -> u64 {
        self.records_published.load(Ordering::Relaxed)
    }

    /// 이번 에폭에서 ack로 확인된 메시지 수를 반환합니다.
    pub fn records_acked(&self) -> u64 {
        self.ledger.acked()
    }

    /// 이번 에폭에서 nack로 확인된 메시지 수를 반환합니다.
    pub fn records_nacked(&self) -> u64 {
        self.ledger.nacked()
    }

    /// 현재 연결 에폭을 반환합니다 (연결 전에는 0).
    pub fn connection_epoch(&self) -> u64 {
        self.ledger.epoch()
    }

    /// 확인 대기 중인 메시지 수를 반환합니다.
    pub fn outstanding_confirms(&self) -> usize {
        self.ledger.outstanding_len()
    }
}

impl<L: BrokerLink> Pipeline for ReliablePublisher<L> {
    async fn start(&mut self) -> Result<(), LogpostError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting broker publisher");

        let record_rx = self.record_rx.take().ok_or_else(|| {
            PipelineError::InitFailed(
                "record receiver not available (was it consumed by a previous start? rebuild the publisher to restart)"
                    .to_owned(),
            )
        })?;

        self.cancel = CancellationToken::new();

        let driver = Driver {
            config: self.config.clone(),
            link: Arc::clone(&self.link),
            record_rx,
            conn_state: Arc::clone(&self.conn_state),
            ledger: Arc::clone(&self.ledger),
            records_published: Arc::clone(&self.records_published),
            cancel: self.cancel.clone(),
        };
        self.tasks.push(tokio::spawn(driver.run()));

        self.state = PipelineState::Running;
        info!("broker publisher started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogpostError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping broker publisher");
        self.conn_state.set(ConnectionState::Closing);
        self.cancel.cancel();

        for mut task in self.tasks.drain(..) {
            match timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if e.is_panic() {
                        error!(error = %e, "publisher driver task panicked");
                    }
                }
                Err(_) => {
                    warn!("publisher driver did not stop in time, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        // 토폴로지 해체와 연결 종료 (각 단계에 해체 시간 제한)
        let teardown = Duration::from_secs(self.config.teardown_timeout_secs);
        match timeout(teardown, self.link.unwind_topology()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "topology unwind failed"),
            Err(_) => warn!("topology unwind timed out"),
        }
        match timeout(teardown, self.link.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "link close failed"),
            Err(_) => warn!("link close timed out"),
        }

        self.conn_state.set(ConnectionState::Disconnected);
        self.state = PipelineState::Stopped;
        info!("broker publisher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => match self.conn_state.get() {
                ConnectionState::Open => HealthStatus::Healthy,
                state => HealthStatus::Degraded(format!("broker link {}", state.name())),
            },
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 펌프 루프가 끝난 이유
enum PumpEnd {
    /// stop()에 의한 취소
    Cancelled,
    /// 연결 유실 또는 발행 실패 -- 재연결 예약
    ConnectionLost,
    /// 레코드 입력 채널 소진 -- 생산자 종료
    InputExhausted,
}

/// 발행 드라이버 -- 세션을 수립하고 레코드/확인 이벤트를 다중화합니다.
struct Driver<L: BrokerLink> {
    config: PublisherConfig,
    link: Arc<L>,
    record_rx: mpsc::Receiver<RecordEvent>,
    conn_state: Arc<SharedConnectionState>,
    ledger: Arc<DeliveryLedger>,
    records_published: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl<L: BrokerLink> Driver<L> {
    async fn run(mut self) {
        loop {
            self.conn_state.set(ConnectionState::Connecting);

            let mut events = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("publisher driver cancelled during session establish");
                    return;
                }
                result = self.establish() => match result {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "broker session establish failed");
                        self.conn_state.set(ConnectionState::Disconnected);
                        if !self.wait_reconnect().await {
                            return;
                        }
                        continue;
                    }
                },
            };

            let epoch = self.ledger.begin_epoch();
            self.conn_state.set(ConnectionState::Open);
            info!(epoch, "broker session open");

            match self.pump(&mut events).await {
                PumpEnd::Cancelled => return,
                PumpEnd::ConnectionLost => {
                    self.conn_state.set(ConnectionState::Disconnected);
                    if !self.wait_reconnect().await {
                        return;
                    }
                }
                PumpEnd::InputExhausted => {
                    info!("record channel closed, draining remaining confirmations");
                    self.drain_events(&mut events).await;
                    return;
                }
            }
        }
    }

    /// 연결 → (프로비저닝) → 토폴로지를 시간 제한과 함께 수행합니다.
    async fn establish(&self) -> Result<mpsc::Receiver<LinkEvent>, PublishPipelineError> {
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let events = timeout(connect_timeout, self.link.connect())
            .await
            .map_err(|_| {
                PublishPipelineError::Connect(format!(
                    "connect timed out after {}s",
                    self.config.connect_timeout_secs
                ))
            })??;

        if self.config.provision {
            let request = ProvisionRequest::from_config(&self.config);
            let provision_timeout = Duration::from_secs(self.config.provision_timeout_secs);
            timeout(provision_timeout, self.link.provision(&request))
                .await
                .map_err(|_| {
                    PublishPipelineError::Provision(format!(
                        "handshake timed out after {}s",
                        self.config.provision_timeout_secs
                    ))
                })??;
        }

        timeout(connect_timeout, self.link.setup_topology())
            .await
            .map_err(|_| {
                PublishPipelineError::Topology(format!(
                    "topology setup timed out after {}s",
                    self.config.connect_timeout_secs
                ))
            })??;

        Ok(events)
    }

    /// 재연결 지연을 기다립니다. 취소되면 false를 반환합니다.
    async fn wait_reconnect(&self) -> bool {
        metrics::counter!(m::PUBLISH_RECONNECTS_TOTAL).increment(1);
        warn!(
            delay_secs = self.config.reconnect_delay_secs,
            "scheduling broker reconnect"
        );
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// 열린 세션에서 레코드 입력과 확인 이벤트를 다중화합니다.
    ///
    /// 레코드는 세션이 열려 있는 동안에만 소비됩니다.
    async fn pump(&mut self, events: &mut mpsc::Receiver<LinkEvent>) -> PumpEnd {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("publisher driver cancelled");
                    return PumpEnd::Cancelled;
                }
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        if self.handle_event(event) {
                            return PumpEnd::ConnectionLost;
                        }
                    }
                    None => {
                        warn!("link event stream ended");
                        return PumpEnd::ConnectionLost;
                    }
                },
                maybe_record = self.record_rx.recv() => match maybe_record {
                    Some(event) => {
                        if self.send(event).await.is_err() {
                            return PumpEnd::ConnectionLost;
                        }
                    }
                    None => return PumpEnd::InputExhausted,
                },
            }
        }
    }

    /// 레코드 입력이 끝난 뒤 남은 확인 이벤트를 처리합니다.
    async fn drain_events(&self, events: &mut mpsc::Receiver<LinkEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        if self.handle_event(event) {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }

    /// 링크 이벤트를 원장에 반영합니다. 연결이 닫혔으면 true를 반환합니다.
    fn handle_event(&self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Ack { tag, multiple } => {
                let resolved = self.ledger.ack(tag, multiple);
                debug!(tag, multiple, resolved, "delivery acked");
                false
            }
            LinkEvent::Nack { tag, multiple } => {
                let resolved = self.ledger.nack(tag, multiple);
                warn!(tag, multiple, resolved, "delivery nacked by broker");
                false
            }
            LinkEvent::Closed { reason } => {
                warn!(reason = %reason, "broker connection closed");
                true
            }
        }
    }

    /// 레코드 하나를 발행하고 전달 태그를 원장에 추가합니다.
    ///
    /// 발행 실패는 연결 유실로 취급되어 재연결을 유발합니다. 실패한
    /// 레코드는 재전송하지 않습니다 (알려진 전달 공백).
    async fn send(&self, event: RecordEvent) -> Result<(), PublishPipelineError> {
        let started = Instant::now();
        match self.link.publish(&event.record).await {
            Ok(tag) => {
                self.ledger.track(tag);
                self.records_published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::PUBLISH_MESSAGES_SENT_TOTAL).increment(1);
                metrics::histogram!(m::PUBLISH_SEND_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                debug!(
                    tag,
                    source = %event.source_path,
                    trace_id = %event.metadata.trace_id,
                    "record published"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    source = %event.source_path,
                    "publish failed, treating session as lost"
                );
                Err(e)
            }
        }
    }
}

/// 신뢰 발행자 빌더
///
/// 발행자를 구성하고 필요한 채널을 생성합니다.
pub struct ReliablePublisherBuilder<L: BrokerLink> {
    config: PublisherConfig,
    link: Option<Arc<L>>,
    record_rx: Option<mpsc::Receiver<RecordEvent>>,
    record_channel_capacity: usize,
}

impl<L: BrokerLink> ReliablePublisherBuilder<L> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PublisherConfig::default(),
            link: None,
            record_rx: None,
            record_channel_capacity: 1024,
        }
    }

    /// 발행 설정을 지정합니다.
    pub fn config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// 브로커 링크를 설정합니다.
    pub fn broker_link(mut self, link: Arc<L>) -> Self {
        self.link = Some(link);
        self
    }

    /// 외부 레코드 수신 채널을 설정합니다.
    ///
    /// `logpost-daemon`에서 수집 파이프라인의 레코드 출력 채널을 여기에
    /// 연결합니다.
    pub fn record_receiver(mut self, rx: mpsc::Receiver<RecordEvent>) -> Self {
        self.record_rx = Some(rx);
        self
    }

    /// 레코드 채널 용량을 설정합니다 (외부 채널 미사용 시).
    pub fn record_channel_capacity(mut self, capacity: usize) -> Self {
        self.record_channel_capacity = capacity;
        self
    }

    /// 발행자를 빌드합니다.
    ///
    /// # Returns
    /// - `ReliablePublisher`: 발행자 인스턴스
    /// - `Option<mpsc::Sender<RecordEvent>>`: 레코드 송신 채널
    ///   (외부 record_receiver를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(ReliablePublisher<L>, Option<mpsc::Sender<RecordEvent>>), PublishPipelineError>
    {
        self.config.validate()?;

        let link = self.link.ok_or_else(|| PublishPipelineError::Config {
            field: "broker_link".to_owned(),
            reason: "broker link must be provided".to_owned(),
        })?;

        let (record_rx, record_tx) = if let Some(rx) = self.record_rx {
            (rx, None)
        } else {
            let (tx, rx) = mpsc::channel(self.record_channel_capacity);
            (rx, Some(tx))
        };

        let publisher = ReliablePublisher {
            config: self.config,
            state: PipelineState::Initialized,
            link,
            record_rx: Some(record_rx),
            conn_state: Arc::new(SharedConnectionState::new()),
            ledger: Arc::new(DeliveryLedger::new()),
            records_published: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        };

        Ok((publisher, record_tx))
    }
}

impl<L: BrokerLink> Default for ReliablePublisherBuilder<L> {
    fn default() -> Self {
        Self::new()
    }
}
