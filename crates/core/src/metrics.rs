//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logpost_`
//! - 모듈명: `tail_`, `publish_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use logpost_core::metrics;
//! use metrics::counter;
//!
//! counter!(logpost_core::metrics::TAIL_RECORDS_EMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 모듈 레이블 키
pub const LABEL_MODULE: &str = "module";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 감시 파일 레이블 키
pub const LABEL_FILE: &str = "file";

/// 분류 결과 레이블 키 (emit, drop)
pub const LABEL_OUTCOME: &str = "outcome";

// ─── Tail Pipeline 메트릭 ───────────────────────────────────────────

/// Tail: 재조립된 전체 라인 수 (counter)
pub const TAIL_LINES_READ_TOTAL: &str = "logpost_tail_lines_read_total";

/// Tail: 읽어들인 바이트 수 (counter)
pub const TAIL_BYTES_READ_TOTAL: &str = "logpost_tail_bytes_read_total";

/// Tail: 채택(Emit)되어 발행 대상이 된 레코드 수 (counter)
pub const TAIL_RECORDS_EMITTED_TOTAL: &str = "logpost_tail_records_emitted_total";

/// Tail: ignore 규칙으로 버려진 라인 수 (counter)
pub const TAIL_LINES_DROPPED_TOTAL: &str = "logpost_tail_lines_dropped_total";

/// Tail: 현재 열려 있는 tail 파일 수 (gauge)
pub const TAIL_FILES_OPEN: &str = "logpost_tail_files_open";

/// Tail: 파일 교체(재생성/이동)로 인한 재바인딩 수 (counter)
pub const TAIL_REBINDS_TOTAL: &str = "logpost_tail_rebinds_total";

/// Tail: 라인 분류 소요 시간 (histogram, 초)
pub const TAIL_CLASSIFY_DURATION_SECONDS: &str = "logpost_tail_classify_duration_seconds";

/// Tail: 채널 포화로 드롭된 레코드 이벤트 수 (counter)
pub const TAIL_EVENTS_DROPPED_TOTAL: &str = "logpost_tail_events_dropped_total";

// ─── Broker Publisher 메트릭 ────────────────────────────────────────

/// Publish: 브로커로 전송한 메시지 수 (counter)
pub const PUBLISH_MESSAGES_SENT_TOTAL: &str = "logpost_publish_messages_sent_total";

/// Publish: 브로커가 확인(ack)한 메시지 수 (counter)
pub const PUBLISH_MESSAGES_ACKED_TOTAL: &str = "logpost_publish_messages_acked_total";

/// Publish: 브로커가 거부(nack)한 메시지 수 (counter)
pub const PUBLISH_MESSAGES_NACKED_TOTAL: &str = "logpost_publish_messages_nacked_total";

/// Publish: 확인 대기 중인 메시지 수 (gauge)
pub const PUBLISH_OUTSTANDING_CONFIRMS: &str = "logpost_publish_outstanding_confirms";

/// Publish: 재연결 횟수 (counter)
pub const PUBLISH_RECONNECTS_TOTAL: &str = "logpost_publish_reconnects_total";

/// Publish: 현재 연결 epoch (gauge)
pub const PUBLISH_CONNECTION_EPOCH: &str = "logpost_publish_connection_epoch";

/// Publish: 발행 호출 소요 시간 (histogram, 초)
pub const PUBLISH_SEND_DURATION_SECONDS: &str = "logpost_publish_send_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logpost_daemon_uptime_seconds";

/// Daemon: 등록된 플러그인 수 (gauge)
pub const DAEMON_PLUGINS_REGISTERED: &str = "logpost_daemon_plugins_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version, commit, rust_version)
pub const DAEMON_BUILD_INFO: &str = "logpost_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 라인 분류 소요 시간 히스토그램 버킷 (초)
///
/// 1us ~ 100ms 범위, 정규식 매칭은 대부분 마이크로초 단위
pub const CLASSIFY_DURATION_BUCKETS: [f64; 10] = [
    0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.1,
];

/// 발행 호출 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 10s 범위 (네트워크 왕복 포함)
pub const SEND_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_gauge!()`, `describe_histogram!()`을
/// 호출하여 Prometheus HELP 텍스트를 설정합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logpost-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Tail Pipeline
    describe_counter!(
        TAIL_LINES_READ_TOTAL,
        "Total number of complete lines reassembled from watched files"
    );
    describe_counter!(
        TAIL_BYTES_READ_TOTAL,
        "Total bytes read from watched files"
    );
    describe_counter!(
        TAIL_RECORDS_EMITTED_TOTAL,
        "Total number of lines accepted by the filter chain and emitted as records"
    );
    describe_counter!(
        TAIL_LINES_DROPPED_TOTAL,
        "Total number of lines dropped by ignore rules"
    );
    describe_gauge!(TAIL_FILES_OPEN, "Number of files currently being tailed");
    describe_counter!(
        TAIL_REBINDS_TOTAL,
        "Total number of tailer rebinds after file recreation or move"
    );
    describe_histogram!(
        TAIL_CLASSIFY_DURATION_SECONDS,
        "Time to classify a single line through the filter chain in seconds"
    );
    describe_counter!(
        TAIL_EVENTS_DROPPED_TOTAL,
        "Total number of record events dropped due to a full channel"
    );

    // Broker Publisher
    describe_counter!(
        PUBLISH_MESSAGES_SENT_TOTAL,
        "Total number of messages sent to the broker"
    );
    describe_counter!(
        PUBLISH_MESSAGES_ACKED_TOTAL,
        "Total number of messages confirmed (acked) by the broker"
    );
    describe_counter!(
        PUBLISH_MESSAGES_NACKED_TOTAL,
        "Total number of messages rejected (nacked) by the broker"
    );
    describe_gauge!(
        PUBLISH_OUTSTANDING_CONFIRMS,
        "Number of published messages awaiting broker confirmation"
    );
    describe_counter!(
        PUBLISH_RECONNECTS_TOTAL,
        "Total number of broker reconnection attempts"
    );
    describe_gauge!(
        PUBLISH_CONNECTION_EPOCH,
        "Current broker connection epoch (increments on each reconnect)"
    );
    describe_histogram!(
        PUBLISH_SEND_DURATION_SECONDS,
        "Time to hand a single message to the broker channel in seconds"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Logpost daemon uptime in seconds");
    describe_gauge!(
        DAEMON_PLUGINS_REGISTERED,
        "Number of plugins registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version/commit labels)"
    );
}
