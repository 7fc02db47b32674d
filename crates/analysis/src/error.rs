//! 분석 엔진 에러 타입
//!
//! [`AnalysisError`]는 룰셋 로딩과 이벤트 처리 중 발생하는 모든 에러를 표현합니다.
//! `From<AnalysisError> for LogtestError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use logtest_core::error::LogtestError;

/// 분석 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 디코더 파일 로딩 실패
    #[error("decoder load error: {path}: {reason}")]
    DecoderLoad {
        /// 디코더 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 디코더 정의 검증 실패
    #[error("decoder validation error: decoder '{name}': {reason}")]
    DecoderValidation {
        /// 문제가 된 디코더 이름
        name: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 룰 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 룰 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 룰 정의 검증 실패
    #[error("rule validation error: rule {rule_id}: {reason}")]
    RuleValidation {
        /// 문제가 된 룰 ID
        rule_id: u32,
        /// 검증 실패 사유
        reason: String,
    },

    /// CDB 리스트 로딩 실패
    #[error("list load error: {path}: {reason}")]
    ListLoad {
        /// 리스트 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 이벤트 형식 오류 (전처리 실패)
    #[error("Incorrect format for event: {reason}")]
    Format {
        /// 실패 사유
        reason: String,
    },

    /// 세션에 로드된 룰이 없음
    #[error("no rules loaded in session")]
    NoRules,

    /// 상관관계 리스트가 존재하지 않음
    #[error("correlation list not found: {0}")]
    MissingList(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<AnalysisError> for LogtestError {
    fn from(err: AnalysisError) -> Self {
        LogtestError::Analysis(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_validation_display() {
        let err = AnalysisError::RuleValidation {
            rule_id: 100_002,
            reason: "frequency requires if_matched_sid or if_matched_group".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("100002"));
        assert!(msg.contains("frequency"));
    }

    #[test]
    fn decoder_load_display_includes_path() {
        let err = AnalysisError::DecoderLoad {
            path: "/etc/logtest/decoders/sshd.yml".to_owned(),
            reason: "invalid YAML".to_owned(),
        };
        assert!(err.to_string().contains("sshd.yml"));
    }

    #[test]
    fn converts_to_logtest_error() {
        let err: LogtestError = AnalysisError::NoRules.into();
        assert!(matches!(err, LogtestError::Analysis(_)));
    }
}
