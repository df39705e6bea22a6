//! 필터 규칙 시스템
//!
//! YAML 규칙 파일을 로드하여 파일별 분류 체인을 구성합니다.
//!
//! # 구성 요소
//! - [`types`]: 규칙 데이터 타입 ([`FileRules`], [`RuleSpec`], [`RuleAction`])
//! - [`loader`]: YAML 파일 로더 ([`RuleLoader`])
//! - [`chain`]: 첫-매칭-승리 분류 체인 ([`FilterChain`], [`Outcome`])
//!
//! # 사용 예
//! ```no_run
//! use logpost_tail::rule::RuleSet;
//!
//! # async fn example() -> Result<(), logpost_tail::TailPipelineError> {
//! let rules = RuleSet::load("/etc/logpost/filters.yml").await?;
//! for (path, chain) in rules.build_chains()? {
//!     println!("{}: {} rules", path.display(), chain.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod loader;
pub mod types;

pub use chain::{FilterChain, Outcome};
pub use loader::RuleLoader;
pub use types::{FileRules, RuleAction, RuleSpec};

use std::path::{Path, PathBuf};

use crate::error::TailPipelineError;

/// 로드된 규칙 파일 전체
///
/// 파일별 규칙 묶음을 선언 순서대로 보관합니다.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: Vec<FileRules>,
}

impl RuleSet {
    /// 규칙 파일을 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailPipelineError> {
        let entries = RuleLoader::load_file(path).await?;
        Ok(Self { entries })
    }

    /// YAML 문자열에서 규칙을 파싱합니다.
    pub fn from_yaml(content: &str, source: &str) -> Result<Self, TailPipelineError> {
        let entries = RuleLoader::parse_yaml(content, source)?;
        Ok(Self { entries })
    }

    /// 감시 대상 파일 수
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// 전체 규칙 수 (캐치올 제외)
    pub fn rule_count(&self) -> usize {
        self.entries.iter().map(|e| e.filters.len()).sum()
    }

    /// 파일별 규칙 항목
    pub fn entries(&self) -> &[FileRules] {
        &self.entries
    }

    /// 파일별 분류 체인을 구성합니다.
    pub fn build_chains(&self) -> Result<Vec<(PathBuf, FilterChain)>, TailPipelineError> {
        self.entries
            .iter()
            .map(|entry| {
                let chain = FilterChain::from_specs(&entry.filters)?;
                Ok((PathBuf::from(&entry.filename), chain))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
- filename: /var/log/app.log
  filters:
    - pattern: "ERROR"
      action: search
      severity: 5
- filename: /var/log/auth.log
  filters:
    - pattern: "Failed password"
      action: search
    - pattern: ".*session opened.*"
      ignore: true
"#;

    #[test]
    fn rule_set_counts() {
        let rules = RuleSet::from_yaml(SAMPLE_YAML, "test.yml").unwrap();
        assert_eq!(rules.file_count(), 2);
        assert_eq!(rules.rule_count(), 3);
    }

    #[test]
    fn build_chains_appends_catch_all_per_file() {
        let rules = RuleSet::from_yaml(SAMPLE_YAML, "test.yml").unwrap();
        let chains = rules.build_chains().unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].0, PathBuf::from("/var/log/app.log"));
        assert_eq!(chains[0].1.len(), 2);
        assert_eq!(chains[1].1.len(), 3);
    }

    #[test]
    fn empty_rule_set_builds_no_chains() {
        let rules = RuleSet::from_yaml("", "test.yml").unwrap();
        assert_eq!(rules.file_count(), 0);
        assert!(rules.build_chains().unwrap().is_empty());
    }
}
