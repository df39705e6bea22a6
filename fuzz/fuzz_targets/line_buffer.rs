#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logpost_tail::buffer::LineBuffer;
use logpost_tail::rule::FilterChain;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 바이트 스트림 (분할 전 원본)
    data: Vec<u8>,
    /// 분할 지점 후보 (data 길이 기준으로 모듈러 처리)
    splits: Vec<u16>,
    /// 라인 길이 상한
    max_line_bytes: u16,
}

fuzz_target!(|input: FuzzInput| {
    // 입력 크기 제한 (성능)
    if input.data.len() > 1 << 16 {
        return;
    }
    let max_line = usize::from(input.max_line_bytes.clamp(1, 4096));

    // 전체를 한 번에 넣은 결과
    let mut whole = LineBuffer::new(FilterChain::pass_through(), max_line);
    whole.push(&input.data);
    let whole_records = whole.drain();

    // 같은 바이트를 임의 지점에서 쪼개 넣은 결과
    let mut offsets: Vec<usize> = input
        .splits
        .iter()
        .take(64)
        .map(|&s| usize::from(s) % (input.data.len() + 1))
        .collect();
    offsets.sort_unstable();

    let mut split = LineBuffer::new(FilterChain::pass_through(), max_line);
    let mut prev = 0;
    for off in offsets {
        split.push(&input.data[prev..off]);
        prev = off;
    }
    split.push(&input.data[prev..]);
    let split_records = split.drain();

    // 청크 분할 방식은 재조립 결과에 영향을 주지 않아야 함
    assert_eq!(whole_records.len(), split_records.len());
    for (a, b) in whole_records.iter().zip(&split_records) {
        assert_eq!(a.line, b.line);
    }
});
