//! 파일시스템 감시 -- 이벤트 구독과 테일러 디스패치
//!
//! 감시 능력은 [`WatchSource`] 트레이트로 추상화됩니다. 운영 구현인
//! [`NotifyWatchSource`]는 notify 백엔드로 부모 디렉터리를 감시하고
//! 구독된 정확한 경로의 이벤트만 전달합니다. [`WatchAdapter`]는 경로
//! 하나의 이벤트 스트림을 [`FileTailer`] 호출로 번역합니다.
//!
//! # 이벤트-동작 대응
//! | 이벤트 | 동작 |
//! |---|---|
//! | Created | 닫혀 있으면 오프셋 0으로 되돌리고 open |
//! | Modified | 열려 있으면 tail |
//! | Deleted | close (오프셋/버퍼 유지) |
//! | Moved | close, 구독을 새 경로로 옮기고 open + tail |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use logpost_core::event::RecordEvent;
use logpost_core::metrics as m;

use crate::error::TailPipelineError;
use crate::rule::FilterChain;
use crate::tailer::FileTailer;

/// 구독 식별자
pub type SubscriptionId = u64;

/// 경로 하나에 대한 파일시스템 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    /// 경로가 생성됨
    Created,
    /// 경로의 내용이 변경됨
    Modified,
    /// 경로가 삭제됨
    Deleted,
    /// 경로가 `dest`로 이동됨
    Moved {
        /// 이동 후 경로
        dest: PathBuf,
    },
}

/// 파일시스템 감시 능력
///
/// 구현체는 구독된 경로에 대한 이벤트만 해당 송신자에 전달해야 합니다.
pub trait WatchSource: Send + Sync + 'static {
    /// 경로 하나를 구독합니다. 이후 이 경로의 이벤트가 `sender`로 들어옵니다.
    fn subscribe(
        &self,
        path: &Path,
        sender: mpsc::Sender<PathEvent>,
    ) -> Result<SubscriptionId, TailPipelineError>;

    /// 구독을 해지합니다. 모르는 식별자는 무시됩니다.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TailPipelineError>;
}

/// 구독 레코드 하나
struct Subscription {
    path: PathBuf,
    dir: PathBuf,
    sender: mpsc::Sender<PathEvent>,
}

#[derive(Default)]
struct Registry {
    subs: HashMap<SubscriptionId, Subscription>,
    /// 디렉터리별 구독 수 -- 0이 되면 감시를 해제합니다.
    dir_refs: HashMap<PathBuf, usize>,
    next_id: SubscriptionId,
}

/// notify 백엔드 기반 감시 소스
///
/// 파일이 아직 없어도 구독할 수 있도록 파일 자체가 아니라 부모
/// 디렉터리를 비재귀로 감시하고, 콜백에서 구독된 정확한 경로만
/// 걸러 전달합니다. 같은 디렉터리의 구독은 감시 하나를 공유합니다.
pub struct NotifyWatchSource {
    registry: Arc<Mutex<Registry>>,
    watcher: Mutex<RecommendedWatcher>,
}

impl NotifyWatchSource {
    /// 감시 소스를 생성합니다.
    pub fn new() -> Result<Self, TailPipelineError> {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let routing = Arc::clone(&registry);
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| route_event(&routing, result),
            Config::default(),
        )
        .map_err(|e| TailPipelineError::Watch {
            path: "(backend)".to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            registry,
            watcher: Mutex::new(watcher),
        })
    }

    /// 현재 구독 수 (진단용)
    pub fn subscription_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subs
            .len()
    }
}

impl WatchSource for NotifyWatchSource {
    fn subscribe(
        &self,
        path: &Path,
        sender: mpsc::Sender<PathEvent>,
    ) -> Result<SubscriptionId, TailPipelineError> {
        let path = path.to_path_buf();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| TailPipelineError::Watch {
                path: path.display().to_string(),
                reason: "path has no parent directory".to_owned(),
            })?;

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        if !registry.dir_refs.contains_key(&dir) {
            let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
            watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| TailPipelineError::Watch {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(dir = %dir.display(), "directory watch started");
        }
        *registry.dir_refs.entry(dir.clone()).or_insert(0) += 1;

        registry.next_id += 1;
        let id = registry.next_id;
        registry.subs.insert(id, Subscription { path, dir, sender });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TailPipelineError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sub) = registry.subs.remove(&id) else {
            return Ok(());
        };

        let drop_watch = match registry.dir_refs.get_mut(&sub.dir) {
            Some(count) => {
                *count -= 1;
                *count == 0
            }
            None => false,
        };
        if drop_watch {
            registry.dir_refs.remove(&sub.dir);
            let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
            // 디렉터리가 이미 사라졌으면 해제는 실패해도 무방합니다.
            if let Err(e) = watcher.unwatch(&sub.dir) {
                debug!(dir = %sub.dir.display(), error = %e, "directory unwatch failed");
            } else {
                debug!(dir = %sub.dir.display(), "directory watch stopped");
            }
        }
        Ok(())
    }
}

/// notify 콜백 -- 원시 이벤트를 구독자별 [`PathEvent`]로 번역합니다.
fn route_event(registry: &Mutex<Registry>, result: notify::Result<Event>) {
    let event = match result {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "watch backend error");
            return;
        }
    };

    let registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
    match event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                deliver(&registry, path, || PathEvent::Created);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [src, dest] = event.paths.as_slice() {
                deliver(&registry, src, || PathEvent::Moved { dest: dest.clone() });
                // 감시 중인 경로 위로 이동해 온 파일은 그 경로의 생성입니다.
                deliver(&registry, dest, || PathEvent::Created);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                deliver(&registry, path, || PathEvent::Deleted);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &event.paths {
                deliver(&registry, path, || PathEvent::Created);
            }
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                deliver(&registry, path, || PathEvent::Modified);
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                deliver(&registry, path, || PathEvent::Deleted);
            }
        }
        _ => {}
    }
}

/// 경로가 일치하는 구독자에게 이벤트를 전달합니다.
///
/// 수신 큐가 가득 차면 이벤트를 버립니다. 콜백 스레드를 블록하지
/// 않기 위한 선택으로, 버려진 수는 메트릭으로 드러납니다.
fn deliver(registry: &Registry, path: &Path, make: impl Fn() -> PathEvent) {
    for sub in registry.subs.values() {
        if sub.path == *path {
            match sub.sender.try_send(make()) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    metrics::counter!(m::TAIL_EVENTS_DROPPED_TOTAL).increment(1);
                    warn!(
                        path = %path.display(),
                        event = ?event,
                        "watch event queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(path = %path.display(), "watch subscriber gone");
                }
            }
        }
    }
}

/// 경로 하나의 이벤트를 테일러 동작으로 번역하는 어댑터
///
/// [`WatchSource`] 구독 하나와 [`FileTailer`] 하나를 묶습니다.
/// 읽어낸 레코드는 [`RecordEvent`]로 감싸 다운스트림 채널로 보냅니다.
pub struct WatchAdapter<W: WatchSource> {
    source: Arc<W>,
    tailer: FileTailer,
    subscription: SubscriptionId,
    /// 이동 시 재구독에 쓰는 송신자 사본
    event_tx: mpsc::Sender<PathEvent>,
    events: mpsc::Receiver<PathEvent>,
    record_tx: mpsc::Sender<RecordEvent>,
    open_files: Arc<AtomicUsize>,
    handle_open: bool,
}

impl<W: WatchSource> WatchAdapter<W> {
    /// 경로 하나에 어댑터를 바인딩합니다.
    ///
    /// 구독을 등록하고 테일러를 연 뒤, 파일에 이미 있던 내용을 한 번
    /// 읽어 내보냅니다. 파일이 아직 없으면 닫힌 채 이벤트를 기다립니다.
    pub async fn bind(
        source: Arc<W>,
        path: PathBuf,
        chain: FilterChain,
        max_line_bytes: usize,
        event_capacity: usize,
        record_tx: mpsc::Sender<RecordEvent>,
        open_files: Arc<AtomicUsize>,
    ) -> Result<Self, TailPipelineError> {
        let (event_tx, events) = mpsc::channel(event_capacity);
        let subscription = source.subscribe(&path, event_tx.clone())?;

        let mut adapter = Self {
            source,
            tailer: FileTailer::new(path, chain, max_line_bytes),
            subscription,
            event_tx,
            events,
            record_tx,
            open_files,
            handle_open: false,
        };

        adapter.tailer.open().await?;
        adapter.sync_open_count();
        adapter.tailer.tail().await?;
        adapter.forward_records().await?;
        Ok(adapter)
    }

    /// 추적 중인 경로
    pub fn path(&self) -> &Path {
        self.tailer.path()
    }

    /// 이벤트 하나를 디스패치합니다.
    pub async fn handle(&mut self, event: PathEvent) -> Result<(), TailPipelineError> {
        match event {
            PathEvent::Created => {
                if !self.tailer.is_open().await {
                    // 재생성된 파일은 새 inode이므로 처음부터 읽습니다.
                    self.tailer.reset_offset();
                    self.tailer.open().await?;
                    self.sync_open_count();
                }
            }
            PathEvent::Modified => {
                if self.tailer.is_open().await {
                    self.tailer.tail().await?;
                    self.forward_records().await?;
                }
            }
            PathEvent::Deleted => {
                self.tailer.close();
                self.sync_open_count();
            }
            PathEvent::Moved { dest } => {
                self.rebind(dest).await?;
            }
        }
        Ok(())
    }

    /// 구독과 테일러를 이동된 경로로 옮깁니다.
    async fn rebind(&mut self, dest: PathBuf) -> Result<(), TailPipelineError> {
        debug!(
            from = %self.tailer.path().display(),
            to = %dest.display(),
            "file moved, rebinding"
        );

        self.tailer.close();
        self.sync_open_count();

        if let Err(e) = self.source.unsubscribe(self.subscription) {
            warn!(path = %self.tailer.path().display(), error = %e, "unsubscribe failed");
        }
        self.subscription = self.source.subscribe(&dest, self.event_tx.clone())?;
        self.tailer.set_path(dest);

        self.tailer.open().await?;
        self.sync_open_count();
        self.tailer.tail().await?;
        self.forward_records().await?;

        metrics::counter!(m::TAIL_REBINDS_TOTAL).increment(1);
        Ok(())
    }

    /// 이벤트 루프 -- 취소되거나 이벤트 소스가 닫힐 때까지 돕니다.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(path = %self.tailer.path().display(), "watch adapter started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = self.events.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Err(e) = self.handle(event).await {
                                warn!(
                                    path = %self.tailer.path().display(),
                                    error = %e,
                                    "watch event handling failed"
                                );
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        if let Err(e) = self.source.unsubscribe(self.subscription) {
            debug!(path = %self.tailer.path().display(), error = %e, "unsubscribe on stop failed");
        }
        self.tailer.close();
        self.sync_open_count();
        debug!(path = %self.tailer.path().display(), "watch adapter stopped");
    }

    /// 대기 레코드를 다운스트림 채널로 내보냅니다.
    async fn forward_records(&mut self) -> Result<(), TailPipelineError> {
        let source_path = self.tailer.path().display().to_string();
        while let Some(record) = self.tailer.pop_record() {
            let event = RecordEvent::new(record, source_path.clone());
            self.record_tx
                .send(event)
                .await
                .map_err(|_| TailPipelineError::Channel("record receiver closed".to_owned()))?;
        }
        Ok(())
    }

    /// 핸들 보유 상태 변화를 열린 파일 수에 반영합니다.
    fn sync_open_count(&mut self) {
        let now_open = self.tailer.has_handle();
        if now_open == self.handle_open {
            return;
        }
        if now_open {
            self.open_files.fetch_add(1, Ordering::Relaxed);
        } else {
            self.open_files.fetch_sub(1, Ordering::Relaxed);
        }
        self.handle_open = now_open;
        metrics::gauge!(m::TAIL_FILES_OPEN).set(self.open_files.load(Ordering::Relaxed) as f64);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// 테스트용 감시 소스 -- 이벤트를 수동으로 주입합니다.
    pub struct MockWatchSource {
        subs: Mutex<HashMap<SubscriptionId, (PathBuf, mpsc::Sender<PathEvent>)>>,
        next_id: AtomicU64,
        fail_subscribe: bool,
    }

    impl MockWatchSource {
        pub fn new() -> Self {
            Self {
                subs: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                fail_subscribe: false,
            }
        }

        /// subscribe가 항상 실패하는 소스를 만듭니다.
        pub fn with_subscribe_failure() -> Self {
            Self {
                fail_subscribe: true,
                ..Self::new()
            }
        }

        /// 경로 구독자들에게 이벤트를 보냅니다. 전달된 구독 수를 반환합니다.
        pub async fn emit(&self, path: &Path, event: PathEvent) -> usize {
            let senders: Vec<_> = {
                let subs = self.subs.lock().unwrap();
                subs.values()
                    .filter(|(sub_path, _)| sub_path == path)
                    .map(|(_, sender)| sender.clone())
                    .collect()
            };
            let mut delivered = 0;
            for sender in senders {
                if sender.send(event.clone()).await.is_ok() {
                    delivered += 1;
                }
            }
            delivered
        }

        pub fn subscribed_paths(&self) -> Vec<PathBuf> {
            self.subs
                .lock()
                .unwrap()
                .values()
                .map(|(path, _)| path.clone())
                .collect()
        }

        pub fn subscription_count(&self) -> usize {
            self.subs.lock().unwrap().len()
        }
    }

    impl WatchSource for MockWatchSource {
        fn subscribe(
            &self,
            path: &Path,
            sender: mpsc::Sender<PathEvent>,
        ) -> Result<SubscriptionId, TailPipelineError> {
            if self.fail_subscribe {
                return Err(TailPipelineError::Watch {
                    path: path.display().to_string(),
                    reason: "mock subscribe failure".to_owned(),
                });
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.subs
                .lock()
                .unwrap()
                .insert(id, (path.to_path_buf(), sender));
            Ok(id)
        }

        fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TailPipelineError> {
            self.subs.lock().unwrap().remove(&id);
            Ok(())
        }
    }
}
