//! 에러 타입 -- 도메인별 에러 정의

/// logtest 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogtestError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 요청/응답 프로토콜 에러
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 세션 관리 에러
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// 룰셋(디코더/룰/리스트) 로딩 및 분석 에러
    #[error("analysis error: {0}")]
    Analysis(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 프로토콜 에러
///
/// 요청 단위 진단 메시지와 달리, 프레임 계층에서 연결을 끊어야 하는 실패를 나타냅니다.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 프레임 크기 초과
    #[error("message too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// 빈 메시지
    #[error("empty message")]
    Empty,

    /// 응답 직렬화 실패
    #[error("failed to encode message: {reason}")]
    Encode { reason: String },

    /// 응답 역직렬화 실패
    #[error("failed to decode message: {reason}")]
    Decode { reason: String },
}

/// 세션 관리 에러
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 세션 초기화 실패 (룰셋 구성 단계에서 롤백됨)
    #[error("session initialization failed: {reason}")]
    InitFailed { reason: String },

    /// 토큰에 해당하는 세션이 없음
    #[error("session '{token}' not found")]
    NotFound { token: String },

    /// 유휴 시간 초과로 만료된 세션
    #[error("session '{token}' expired")]
    Expired { token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: LogtestError = ConfigError::InvalidValue {
            field: "logtest.threads".to_owned(),
            reason: "must be between 1 and 128".to_owned(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("config error:"));
        assert!(msg.contains("logtest.threads"));
    }

    #[test]
    fn session_error_display_includes_token() {
        let err = SessionError::NotFound {
            token: "deadbeef".to_owned(),
        };
        assert_eq!(err.to_string(), "session 'deadbeef' not found");
    }

    #[test]
    fn protocol_too_large_reports_sizes() {
        let err = ProtocolError::TooLarge {
            size: 70_000,
            max: 65_536,
        };
        assert!(err.to_string().contains("70000"));
        assert!(err.to_string().contains("65536"));
    }
}
