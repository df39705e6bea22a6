#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logpost_tail::rule::types::{RuleAction, RuleSpec};
use logpost_tail::rule::FilterChain;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 명세 목록 (최대 8개로 제한)
    specs: Vec<FuzzSpec>,
    /// 분류 대상 라인
    line: String,
}

#[derive(Arbitrary, Debug)]
struct FuzzSpec {
    pattern: String,
    action: u8,
    ignore: bool,
}

fuzz_target!(|input: FuzzInput| {
    // 패턴 길이 제한 (정규식 컴파일 비용)
    if input.specs.iter().any(|s| s.pattern.len() > 512) {
        return;
    }

    let specs: Vec<RuleSpec> = input
        .specs
        .iter()
        .take(8)
        .map(|s| RuleSpec {
            pattern: s.pattern.clone(),
            action: match s.action % 3 {
                0 => RuleAction::Match,
                1 => RuleAction::Search,
                _ => RuleAction::FullMatch,
            },
            ignore: s.ignore,
            attributes: serde_json::Map::new(),
        })
        .collect();

    // 컴파일 실패는 에러로 반환되어야지 패닉해서는 안 됨
    let Ok(chain) = FilterChain::from_specs(&specs) else {
        return;
    };

    // 분류는 전수적 -- 어떤 라인이든 Outcome을 받아야 함
    let _ = chain.classify(&input.line);
});
