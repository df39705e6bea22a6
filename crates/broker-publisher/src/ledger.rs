//! 에폭별 전달 확인 원장
//!
//! [`DeliveryLedger`]는 발행된 메시지의 전달 태그를 추적하고
//! 브로커의 ack/nack 확인으로 이를 해소합니다. 연결이 끊기면 에폭이
//! 증가하면서 미확인 목록과 카운터가 한 번의 잠금 안에서 함께
//! 초기화됩니다 -- 이전 에폭의 태그가 새 에폭의 확인과 섞이지 않습니다.
//!
//! # 확인 의미론
//!
//! AMQP의 confirm 프레임은 `multiple` 플래그를 가집니다:
//! - `multiple=true`: 해당 태그 이하의 모든 미확인 메시지를 확인
//! - `multiple=false`: 해당 태그 하나만 확인

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use logpost_core::metrics as m;

/// 전달 확인 원장
///
/// 발행 드라이버와 파이프라인 핸들이 `Arc`로 공유합니다.
/// 모든 상태 변경은 단일 잠금 아래에서 일어나므로 에폭 초기화가
/// 부분적으로 관측되는 일이 없습니다.
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    /// 현재 연결 에폭 (첫 연결 성공 시 1)
    epoch: u64,
    /// 확인 대기 중인 전달 태그 (발행 순서 = 오름차순)
    outstanding: VecDeque<u64>,
    /// 이번 에폭에서 ack로 해소된 메시지 수
    acked: u64,
    /// 이번 에폭에서 nack로 해소된 메시지 수
    nacked: u64,
}

impl DeliveryLedger {
    /// 빈 원장을 생성합니다 (에폭 0 = 아직 연결 없음).
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 새 에폭을 시작합니다: 미확인 목록과 카운터를 비우고 에폭을 올립니다.
    ///
    /// 연결(또는 재연결) 성공 직후 호출합니다. 초기화 시점에 남아 있던
    /// 미확인 메시지는 재전송되지 않습니다 (알려진 전달 공백).
    pub fn begin_epoch(&self) -> u64 {
        let mut inner = self.lock();
        let abandoned = inner.outstanding.len();
        if abandoned > 0 {
            warn!(
                abandoned,
                epoch = inner.epoch,
                "abandoning unconfirmed deliveries from previous epoch"
            );
        }
        inner.outstanding.clear();
        inner.acked = 0;
        inner.nacked = 0;
        inner.epoch += 1;
        metrics::gauge!(m::PUBLISH_OUTSTANDING_CONFIRMS).set(0.0);
        metrics::gauge!(m::PUBLISH_CONNECTION_EPOCH).set(inner.epoch as f64);
        inner.epoch
    }

    /// 발행된 메시지의 전달 태그를 미확인 목록에 추가합니다.
    pub fn track(&self, tag: u64) {
        let mut inner = self.lock();
        if let Some(&last) = inner.outstanding.back() {
            if tag <= last {
                warn!(tag, last, "delivery tag is not monotonic within epoch");
            }
        }
        inner.outstanding.push_back(tag);
        metrics::gauge!(m::PUBLISH_OUTSTANDING_CONFIRMS).set(inner.outstanding.len() as f64);
    }

    /// ack 확인을 반영하고 해소된 메시지 수를 반환합니다.
    pub fn ack(&self, tag: u64, multiple: bool) -> u64 {
        let mut inner = self.lock();
        let resolved = remove_confirmed(&mut inner.outstanding, tag, multiple);
        if resolved == 0 {
            warn!(tag, multiple, "ack for unknown delivery tag");
        }
        inner.acked += resolved;
        metrics::counter!(m::PUBLISH_MESSAGES_ACKED_TOTAL).increment(resolved);
        metrics::gauge!(m::PUBLISH_OUTSTANDING_CONFIRMS).set(inner.outstanding.len() as f64);
        resolved
    }

    /// nack 확인을 반영하고 해소된 메시지 수를 반환합니다.
    pub fn nack(&self, tag: u64, multiple: bool) -> u64 {
        let mut inner = self.lock();
        let resolved = remove_confirmed(&mut inner.outstanding, tag, multiple);
        if resolved == 0 {
            warn!(tag, multiple, "nack for unknown delivery tag");
        }
        inner.nacked += resolved;
        metrics::counter!(m::PUBLISH_MESSAGES_NACKED_TOTAL).increment(resolved);
        metrics::gauge!(m::PUBLISH_OUTSTANDING_CONFIRMS).set(inner.outstanding.len() as f64);
        resolved
    }

    /// 현재 에폭을 반환합니다 (연결 전에는 0).
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// 이번 에폭에서 ack로 해소된 메시지 수를 반환합니다.
    pub fn acked(&self) -> u64 {
        self.lock().acked
    }

    /// 이번 에폭에서 nack로 해소된 메시지 수를 반환합니다.
    pub fn nacked(&self) -> u64 {
        self.lock().nacked
    }

    /// 확인 대기 중인 메시지 수를 반환합니다.
    pub fn outstanding_len(&self) -> usize {
        self.lock().outstanding.len()
    }

    /// 모든 발행이 확인되었는지 여부를 반환합니다.
    pub fn is_settled(&self) -> bool {
        self.lock().outstanding.is_empty()
    }

    /// 확인 대기 중인 태그의 사본을 반환합니다 (진단/테스트용).
    pub fn outstanding_snapshot(&self) -> Vec<u64> {
        self.lock().outstanding.iter().copied().collect()
    }
}

fn remove_confirmed(outstanding: &mut VecDeque<u64>, tag: u64, multiple: bool) -> u64 {
    if multiple {
        let before = outstanding.len();
        outstanding.retain(|&t| t > tag);
        (before - outstanding.len()) as u64
    } else if let Some(idx) = outstanding.iter().position(|&t| t == tag) {
        outstanding.remove(idx);
        1
    } else {
        0
    }
}
