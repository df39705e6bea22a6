//! 규칙 체인 -- 순서 있는 첫-매칭-승리 분류기
//!
//! [`FilterChain`]은 컴파일된 규칙을 선언 순서대로 보관하고, 라인을
//! 첫 번째로 매칭되는 규칙에 따라 [`Outcome`]으로 분류합니다. 체인
//! 끝에는 항상 매칭되는 캐치올 규칙이 붙어 있어 분류는 전수적입니다.

use std::time::Instant;

use regex::Regex;
use serde_json::{Map, Value};

use logpost_core::metrics as m;
use logpost_core::record::Record;

use crate::error::TailPipelineError;
use crate::rule::types::{RuleAction, RuleSpec};

/// 분류 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 라인을 레코드로 방출
    Emit(Record),
    /// 라인을 버림
    Drop,
}

impl Outcome {
    /// 방출 결과인지 여부
    pub fn is_emit(&self) -> bool {
        matches!(self, Outcome::Emit(_))
    }
}

/// 컴파일된 규칙 하나
///
/// `regex`가 `None`이면 캐치올 규칙으로, 모든 라인에 매칭됩니다.
#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Option<Regex>,
    ignore: bool,
    attributes: Map<String, Value>,
}

impl CompiledRule {
    /// 규칙 명세를 컴파일합니다. 적용 방식에 따라 패턴을 앵커링합니다.
    fn compile(spec: &RuleSpec) -> Result<Self, TailPipelineError> {
        let anchored = match spec.action {
            RuleAction::Match => format!(r"\A(?:{})", spec.pattern),
            RuleAction::Search => spec.pattern.clone(),
            RuleAction::FullMatch => format!(r"\A(?:{})\z", spec.pattern),
        };
        let regex = Regex::new(&anchored).map_err(|e| TailPipelineError::RuleValidation {
            target: spec.pattern.clone(),
            reason: format!("pattern does not compile: {e}"),
        })?;
        Ok(Self {
            regex: Some(regex),
            ignore: spec.ignore,
            attributes: spec.attributes.clone(),
        })
    }

    /// 체인 끝에 붙는 캐치올 규칙
    fn catch_all() -> Self {
        Self {
            regex: None,
            ignore: false,
            attributes: Map::new(),
        }
    }

    fn matches(&self, line: &str) -> bool {
        self.regex.as_ref().is_none_or(|r| r.is_match(line))
    }
}

/// 순서 있는 규칙 체인
///
/// 규칙은 선언 순서대로 평가되며 첫 번째로 매칭되는 규칙이 결과를
/// 결정합니다. 마지막 캐치올 규칙 덕분에 모든 라인은 분류됩니다.
#[derive(Debug, Clone)]
pub struct FilterChain {
    rules: Vec<CompiledRule>,
}

impl FilterChain {
    /// 규칙 명세 목록에서 체인을 구성합니다.
    ///
    /// 캐치올 규칙(속성 없음, 버리지 않음)이 자동으로 끝에 추가됩니다.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, TailPipelineError> {
        let mut rules = Vec::with_capacity(specs.len() + 1);
        for spec in specs {
            rules.push(CompiledRule::compile(spec)?);
        }
        rules.push(CompiledRule::catch_all());
        Ok(Self { rules })
    }

    /// 규칙이 없는 체인 -- 캐치올만 포함하며 모든 라인을 방출합니다.
    pub fn pass_through() -> Self {
        Self {
            rules: vec![CompiledRule::catch_all()],
        }
    }

    /// 캐치올을 포함한 규칙 개수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 체인이 캐치올만 포함하는지 여부
    pub fn is_pass_through(&self) -> bool {
        self.rules.len() == 1
    }

    /// 라인을 분류합니다.
    ///
    /// 첫 번째로 매칭되는 규칙이 결과를 결정합니다. `ignore` 규칙은
    /// [`Outcome::Drop`]을, 그 외에는 규칙 속성이 복사된 레코드를
    /// 담은 [`Outcome::Emit`]을 반환합니다.
    pub fn classify(&self, line: &str) -> Outcome {
        let start = Instant::now();
        let outcome = self.classify_inner(line);
        metrics::histogram!(m::TAIL_CLASSIFY_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        outcome
    }

    fn classify_inner(&self, line: &str) -> Outcome {
        for rule in &self.rules {
            if rule.matches(line) {
                if rule.ignore {
                    return Outcome::Drop;
                }
                return Outcome::Emit(Record::with_attributes(line, rule.attributes.clone()));
            }
        }
        // 캐치올이 항상 매칭되므로 도달하지 않지만, 분류는 전수적이어야 합니다.
        Outcome::Emit(Record::new(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pattern: &str, action: RuleAction, ignore: bool) -> RuleSpec {
        RuleSpec {
            pattern: pattern.to_owned(),
            action,
            ignore,
            attributes: Map::new(),
        }
    }

    fn spec_with_attr(pattern: &str, action: RuleAction, key: &str, value: Value) -> RuleSpec {
        let mut attributes = Map::new();
        attributes.insert(key.to_owned(), value);
        RuleSpec {
            pattern: pattern.to_owned(),
            action,
            ignore: false,
            attributes,
        }
    }

    #[test]
    fn empty_chain_emits_everything() {
        let chain = FilterChain::from_specs(&[]).unwrap();
        assert!(chain.is_pass_through());

        let outcome = chain.classify("any line at all");
        match outcome {
            Outcome::Emit(record) => {
                assert_eq!(record.line, "any line at all");
                assert!(record.attributes.is_empty());
            }
            Outcome::Drop => panic!("catch-all must emit"),
        }
    }

    #[test]
    fn first_match_wins() {
        let chain = FilterChain::from_specs(&[
            spec_with_attr("ERROR", RuleAction::Search, "severity", Value::from(5)),
            spec_with_attr("ERROR", RuleAction::Search, "severity", Value::from(1)),
        ])
        .unwrap();

        match chain.classify("an ERROR occurred") {
            Outcome::Emit(record) => {
                assert_eq!(record.attributes["severity"], Value::from(5));
            }
            Outcome::Drop => panic!("expected emit"),
        }
    }

    #[test]
    fn ignore_rule_drops_line() {
        let chain = FilterChain::from_specs(&[spec(".*DEBUG.*", RuleAction::Match, true)]).unwrap();
        assert_eq!(chain.classify("2024 DEBUG noisy"), Outcome::Drop);
    }

    #[test]
    fn ignore_shadowed_by_earlier_emit() {
        let chain = FilterChain::from_specs(&[
            spec("DEBUG", RuleAction::Search, false),
            spec(".*DEBUG.*", RuleAction::Match, true),
        ])
        .unwrap();
        assert!(chain.classify("DEBUG important").is_emit());
    }

    #[test]
    fn unmatched_line_falls_through_to_catch_all() {
        let chain = FilterChain::from_specs(&[
            spec("ERROR", RuleAction::Search, false),
            spec("WARN", RuleAction::Search, true),
        ])
        .unwrap();

        match chain.classify("plain info line") {
            Outcome::Emit(record) => {
                assert_eq!(record.line, "plain info line");
                assert!(record.attributes.is_empty());
            }
            Outcome::Drop => panic!("catch-all must emit"),
        }
    }

    #[test]
    fn match_action_anchors_at_line_start() {
        let chain =
            FilterChain::from_specs(&[spec_with_attr("ERROR", RuleAction::Match, "hit", Value::Bool(true))])
                .unwrap();

        match chain.classify("ERROR at start") {
            Outcome::Emit(record) => assert!(record.attributes.contains_key("hit")),
            Outcome::Drop => panic!("expected emit"),
        }
        // 시작 앵커 때문에 중간의 ERROR는 매칭되지 않고 캐치올로 떨어집니다.
        match chain.classify("prefix ERROR later") {
            Outcome::Emit(record) => assert!(record.attributes.is_empty()),
            Outcome::Drop => panic!("expected emit"),
        }
    }

    #[test]
    fn search_action_matches_anywhere() {
        let chain =
            FilterChain::from_specs(&[spec_with_attr("ERROR", RuleAction::Search, "hit", Value::Bool(true))])
                .unwrap();

        match chain.classify("prefix ERROR later") {
            Outcome::Emit(record) => assert!(record.attributes.contains_key("hit")),
            Outcome::Drop => panic!("expected emit"),
        }
    }

    #[test]
    fn fullmatch_action_requires_entire_line() {
        let chain =
            FilterChain::from_specs(&[spec_with_attr("OK", RuleAction::FullMatch, "hit", Value::Bool(true))])
                .unwrap();

        match chain.classify("OK") {
            Outcome::Emit(record) => assert!(record.attributes.contains_key("hit")),
            Outcome::Drop => panic!("expected emit"),
        }
        match chain.classify("OK trailing") {
            Outcome::Emit(record) => assert!(record.attributes.is_empty()),
            Outcome::Drop => panic!("expected emit"),
        }
    }

    #[test]
    fn emitted_record_serializes_with_line_and_attributes() {
        let chain = FilterChain::from_specs(&[spec_with_attr(
            "ERROR",
            RuleAction::Search,
            "severity",
            Value::from(5),
        )])
        .unwrap();

        let Outcome::Emit(record) = chain.classify("disk ERROR") else {
            panic!("expected emit");
        };
        let value = record.to_value();
        assert_eq!(value["string"], Value::from("disk ERROR"));
        assert_eq!(value["severity"], Value::from(5));
    }

    #[test]
    fn empty_line_reaches_catch_all() {
        let chain = FilterChain::from_specs(&[spec("ERROR", RuleAction::Search, false)]).unwrap();
        assert!(chain.classify("").is_emit());
    }

    #[test]
    fn chain_len_includes_catch_all() {
        let chain = FilterChain::from_specs(&[spec("a", RuleAction::Match, false)]).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(!chain.is_pass_through());
    }

    #[test]
    fn pass_through_chain_emits_without_attributes() {
        let chain = FilterChain::pass_through();
        match chain.classify("anything") {
            Outcome::Emit(record) => assert!(record.attributes.is_empty()),
            Outcome::Drop => panic!("expected emit"),
        }
    }
}
