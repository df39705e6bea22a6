//! 라인 버퍼 -- 바이트 청크를 라인 단위 레코드로 재조립
//!
//! 테일 읽기는 라인 경계와 무관한 임의 크기의 바이트 청크로 들어옵니다.
//! [`LineBuffer`]는 청크를 이어 붙여 `\n` 종결 라인을 복원하고, 종결되지
//! 않은 꼬리는 다음 청크가 올 때까지 캐리로 보관합니다. 복원된 라인은
//! 즉시 [`FilterChain`]으로 분류되어 대기열에 쌓입니다.
//!
//! # 불변 조건
//! 같은 바이트 스트림은 청크 분할 방식과 무관하게 같은 레코드 열을
//! 만들어냅니다.

use std::collections::VecDeque;

use logpost_core::metrics as m;
use logpost_core::record::Record;
use tracing::debug;

use crate::rule::{FilterChain, Outcome};

/// 바이트 청크를 라인으로 재조립하고 분류하는 버퍼
#[derive(Debug)]
pub struct LineBuffer {
    /// 아직 종결되지 않은 라인 조각
    carry: Vec<u8>,
    /// 분류를 통과한 대기 레코드
    pending: VecDeque<Record>,
    chain: FilterChain,
    /// 라인 최대 길이 (바이트, 종결자 제외)
    max_line_bytes: usize,
    /// 초과 라인의 나머지를 다음 종결자까지 삼키는 중인지 여부
    discarding: bool,
    lines_seen: u64,
    records_emitted: u64,
    lines_dropped: u64,
}

impl LineBuffer {
    /// 분류 체인과 라인 길이 상한으로 버퍼를 생성합니다.
    pub fn new(chain: FilterChain, max_line_bytes: usize) -> Self {
        Self {
            carry: Vec::new(),
            pending: VecDeque::new(),
            chain,
            max_line_bytes,
            discarding: false,
            lines_seen: 0,
            records_emitted: 0,
            lines_dropped: 0,
        }
    }

    /// 바이트 청크를 밀어 넣습니다.
    ///
    /// 이번 호출로 대기열에 추가된 레코드 수를 반환합니다. 종결되지
    /// 않은 꼬리는 캐리에 남아 다음 호출에서 이어집니다.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let mut queued = 0;
        let mut rest = data;

        while let Some(idx) = rest.iter().position(|&b| b == b'\n') {
            let head = &rest[..idx];
            rest = &rest[idx + 1..];

            if self.discarding {
                // 초과 라인의 꼬리가 끝났습니다. 다음 라인부터 정상 처리합니다.
                self.discarding = false;
                continue;
            }

            self.carry.extend_from_slice(head);
            let mut line = std::mem::take(&mut self.carry);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            queued += self.accept_line(&line);
        }

        if self.discarding {
            return queued;
        }

        self.carry.extend_from_slice(rest);
        // 캐리는 말미 \r 한 바이트를 고려해 상한+1까지 허용합니다.
        if self.carry.len() > self.max_line_bytes + 1 {
            self.carry.clear();
            self.discarding = true;
            self.lines_seen += 1;
            self.lines_dropped += 1;
            metrics::counter!(m::TAIL_LINES_DROPPED_TOTAL, m::LABEL_OUTCOME => "oversized")
                .increment(1);
            debug!(max = self.max_line_bytes, "unterminated line exceeded limit, discarding");
        }

        queued
    }

    /// 종결된 라인 하나를 분류하고 대기열에 반영합니다.
    fn accept_line(&mut self, line: &[u8]) -> usize {
        self.lines_seen += 1;
        metrics::counter!(m::TAIL_LINES_READ_TOTAL).increment(1);

        if line.len() > self.max_line_bytes {
            self.lines_dropped += 1;
            metrics::counter!(m::TAIL_LINES_DROPPED_TOTAL, m::LABEL_OUTCOME => "oversized")
                .increment(1);
            debug!(
                len = line.len(),
                max = self.max_line_bytes,
                "oversized line dropped"
            );
            return 0;
        }

        let text = String::from_utf8_lossy(line);
        match self.chain.classify(&text) {
            Outcome::Emit(record) => {
                self.pending.push_back(record);
                self.records_emitted += 1;
                metrics::counter!(m::TAIL_RECORDS_EMITTED_TOTAL).increment(1);
                1
            }
            Outcome::Drop => {
                self.lines_dropped += 1;
                metrics::counter!(m::TAIL_LINES_DROPPED_TOTAL, m::LABEL_OUTCOME => "filtered")
                    .increment(1);
                debug!(line = %text, "line dropped by filter");
                0
            }
        }
    }

    /// 가장 오래된 대기 레코드를 꺼냅니다.
    pub fn pop(&mut self) -> Option<Record> {
        self.pending.pop_front()
    }

    /// 대기 레코드를 전부 꺼냅니다.
    pub fn drain(&mut self) -> Vec<Record> {
        self.pending.drain(..).collect()
    }

    /// 대기 레코드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 대기 레코드 수
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 캐리에 남은 바이트 수
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    /// 지금까지 복원한 라인 수 (버려진 라인 포함)
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// 지금까지 방출한 레코드 수
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// 지금까지 버린 라인 수 (필터 드롭 + 길이 초과)
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }
}
