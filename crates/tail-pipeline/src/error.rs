//! 테일 파이프라인 에러 타입
//!
//! [`TailPipelineError`]는 테일 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<TailPipelineError> for LogpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logpost_core::error::{LogpostError, TailError};

/// 테일 파이프라인 도메인 에러
///
/// 필터 규칙 로딩/검증, 파일 테일링, 파일시스템 감시, 채널 통신 등
/// 파이프라인 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum TailPipelineError {
    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: {target}: {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 대상 (파일명 또는 패턴)
        target: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 파일시스템 감시 실패 (watch 등록/해제)
    #[error("watch error: {path}: {reason}")]
    Watch {
        /// 감시 대상 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 테일링 실패 (열기/읽기/seek)
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 대상 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<TailPipelineError> for LogpostError {
    fn from(err: TailPipelineError) -> Self {
        match &err {
            TailPipelineError::RuleLoad { .. }
            | TailPipelineError::RuleValidation { .. }
            | TailPipelineError::Regex(_) => LogpostError::Tail(TailError::Rule(err.to_string())),
            TailPipelineError::Watch { .. } => LogpostError::Tail(TailError::Watch(err.to_string())),
            TailPipelineError::Tail { .. } | TailPipelineError::Io(_) => {
                LogpostError::Tail(TailError::Collect(err.to_string()))
            }
            TailPipelineError::Config { .. } | TailPipelineError::Channel(_) => {
                LogpostError::Tail(TailError::Collect(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_load_error_display() {
        let err = TailPipelineError::RuleLoad {
            path: "/etc/logpost/filters.yml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("filters.yml"));
        assert!(msg.contains("invalid YAML"));
    }

    #[test]
    fn rule_validation_error_display() {
        let err = TailPipelineError::RuleValidation {
            target: "/var/log/app.log".to_owned(),
            reason: "pattern must not be empty".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("app.log"));
        assert!(msg.contains("pattern must not be empty"));
    }

    #[test]
    fn watch_error_display() {
        let err = TailPipelineError::Watch {
            path: "/var/log/app.log".to_owned(),
            reason: "inotify limit reached".to_owned(),
        };
        assert!(err.to_string().contains("inotify limit reached"));
    }

    #[test]
    fn tail_error_display() {
        let err = TailPipelineError::Tail {
            path: "/var/log/app.log".to_owned(),
            reason: "seek failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("app.log"));
        assert!(msg.contains("seek failed"));
    }

    #[test]
    fn converts_rule_errors_to_tail_rule() {
        let err = TailPipelineError::RuleValidation {
            target: "x".to_owned(),
            reason: "bad".to_owned(),
        };
        let logpost_err: LogpostError = err.into();
        assert!(matches!(logpost_err, LogpostError::Tail(TailError::Rule(_))));
    }

    #[test]
    fn converts_watch_errors_to_tail_watch() {
        let err = TailPipelineError::Watch {
            path: "/tmp/x".to_owned(),
            reason: "denied".to_owned(),
        };
        let logpost_err: LogpostError = err.into();
        assert!(matches!(
            logpost_err,
            LogpostError::Tail(TailError::Watch(_))
        ));
    }

    #[test]
    fn converts_io_errors_to_tail_collect() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TailPipelineError::Io(io_err);
        let logpost_err: LogpostError = err.into();
        assert!(matches!(
            logpost_err,
            LogpostError::Tail(TailError::Collect(_))
        ));
    }

    #[test]
    fn regex_error_converts_from_regex_crate() {
        let regex_err = regex::Regex::new("[unclosed").unwrap_err();
        let err: TailPipelineError = regex_err.into();
        assert!(matches!(err, TailPipelineError::Regex(_)));
    }
}
