//! YAML 규칙 파일 로더
//!
//! 규칙 파일을 읽고 파싱하여 검증된 [`FileRules`] 목록을 반환합니다.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::TailPipelineError;
use crate::rule::types::FileRules;

/// 규칙 파일 최대 크기 (10MB)
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 파일 전체에 걸친 최대 규칙 개수
const MAX_RULES_COUNT: usize = 10_000;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 파일에서 규칙을 비동기로 로드합니다.
    ///
    /// # 과정
    /// 1. 파일 크기 검증 (최대 10MB)
    /// 2. 파일 내용 읽기
    /// 3. YAML 파싱 및 규칙 검증
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<FileRules>, TailPipelineError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| TailPipelineError::RuleLoad {
                    path: path_str.clone(),
                    reason: format!("cannot read metadata: {e}"),
                })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(TailPipelineError::RuleLoad {
                path: path_str,
                reason: format!(
                    "file too large: {} bytes (max {} bytes)",
                    metadata.len(),
                    MAX_RULE_FILE_SIZE
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TailPipelineError::RuleLoad {
                    path: path_str.clone(),
                    reason: format!("cannot read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path_str)
    }

    /// YAML 문자열을 파싱하여 검증된 규칙 목록을 반환합니다.
    ///
    /// - 빈 문서는 빈 목록으로 처리됩니다.
    /// - 상대 경로 `filename`은 현재 작업 디렉터리 기준 절대 경로로 정규화됩니다.
    /// - 같은 파일이 두 번 나오면 먼저 선언된 항목이 우선하고 나머지는 무시됩니다.
    pub fn parse_yaml(content: &str, source: &str) -> Result<Vec<FileRules>, TailPipelineError> {
        if content.trim().is_empty() {
            debug!(source, "empty rule file, no rules loaded");
            return Ok(Vec::new());
        }

        let entries: Vec<FileRules> =
            serde_yaml::from_str(content).map_err(|e| TailPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("yaml parse error: {e}"),
            })?;

        let total_rules: usize = entries.iter().map(|e| e.filters.len()).sum();
        if total_rules > MAX_RULES_COUNT {
            return Err(TailPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("too many rules: {total_rules} (max {MAX_RULES_COUNT})"),
            });
        }

        let mut validated: Vec<FileRules> = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.validate()?;
            entry.filename = Self::absolutize(&entry.filename);

            if validated.iter().any(|v| v.filename == entry.filename) {
                warn!(
                    filename = %entry.filename,
                    "duplicate filename in rule file, keeping first entry"
                );
                continue;
            }
            validated.push(entry);
        }

        debug!(
            source,
            files = validated.len(),
            rules = total_rules,
            "rules loaded"
        );

        Ok(validated)
    }

    /// 상대 경로를 현재 작업 디렉터리 기준으로 절대 경로화합니다.
    fn absolutize(filename: &str) -> String {
        let path = Path::new(filename);
        if path.is_absolute() {
            return filename.to_owned();
        }
        match std::path::absolute(path) {
            Ok(abs) => abs.display().to_string(),
            Err(_) => filename.to_owned(),
        }
    }
}
