//! 필터 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체들을 정의합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use logpost_core::record::RESERVED_LINE_KEY;

use crate::error::TailPipelineError;

/// 패턴 적용 방식
///
/// 규칙의 정규식을 라인에 어떻게 적용할지 결정합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// 라인 시작에서 매칭 (기본값)
    #[default]
    Match,
    /// 라인 내 임의 위치에서 검색
    Search,
    /// 라인 전체가 패턴과 일치해야 함
    FullMatch,
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleAction::Match => write!(f, "match"),
            RuleAction::Search => write!(f, "search"),
            RuleAction::FullMatch => write!(f, "fullmatch"),
        }
    }
}

/// 필터 규칙 -- 하나의 패턴과 그에 딸린 속성을 나타냅니다.
///
/// # YAML 스키마
/// ```yaml
/// pattern: "ERROR"
/// action: search
/// severity: 5
/// team: backend
/// ```
///
/// `pattern`/`action`/`ignore` 외의 모든 스칼라 키는 `attributes`로
/// 수집되어 매칭된 레코드에 그대로 복사됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// 정규식 패턴 (필수, 비어있지 않아야 함)
    pub pattern: String,
    /// 패턴 적용 방식
    #[serde(default)]
    pub action: RuleAction,
    /// true이면 매칭된 라인을 버림 (레코드 생성하지 않음)
    #[serde(default)]
    pub ignore: bool,
    /// 임의의 스칼라 속성 (매칭 시 레코드에 복사됨)
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl RuleSpec {
    /// 규칙의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    /// - 패턴은 비어있지 않아야 하고 정규식으로 컴파일되어야 함
    /// - 속성 키에 예약 키 `string`을 사용할 수 없음
    /// - 속성 값은 스칼라(문자열/숫자/불리언)여야 함
    pub fn validate(&self) -> Result<(), TailPipelineError> {
        if self.pattern.is_empty() {
            return Err(TailPipelineError::RuleValidation {
                target: "(empty)".to_owned(),
                reason: "pattern must not be empty".to_owned(),
            });
        }

        if let Err(e) = regex::Regex::new(&self.pattern) {
            return Err(TailPipelineError::RuleValidation {
                target: self.pattern.clone(),
                reason: format!("pattern does not compile: {e}"),
            });
        }

        if self.attributes.contains_key(RESERVED_LINE_KEY) {
            return Err(TailPipelineError::RuleValidation {
                target: self.pattern.clone(),
                reason: format!("attribute key '{RESERVED_LINE_KEY}' is reserved"),
            });
        }

        for (key, value) in &self.attributes {
            if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                return Err(TailPipelineError::RuleValidation {
                    target: self.pattern.clone(),
                    reason: format!("attribute '{key}' must be a scalar value"),
                });
            }
        }

        Ok(())
    }
}

/// 파일별 규칙 묶음 -- 규칙 파일의 최상위 리스트 항목 하나에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// - filename: /var/log/app.log
///   filters:
///     - pattern: "ERROR"
///       action: search
///       severity: 5
///     - pattern: ".*DEBUG.*"
///       ignore: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRules {
    /// 감시할 파일 경로
    pub filename: String,
    /// 이 파일에 적용할 규칙 목록 (선언 순서 유지)
    #[serde(default)]
    pub filters: Vec<RuleSpec>,
}

impl FileRules {
    /// 이 항목의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailPipelineError> {
        if self.filename.is_empty() {
            return Err(TailPipelineError::RuleValidation {
                target: "(empty)".to_owned(),
                reason: "filename must not be empty".to_owned(),
            });
        }

        for spec in &self.filters {
            spec.validate().map_err(|e| match e {
                TailPipelineError::RuleValidation { target, reason } => {
                    TailPipelineError::RuleValidation {
                        target: format!("{}: {target}", self.filename),
                        reason,
                    }
                }
                other => other,
            })?;
        }

        Ok(())
    }
}
