//! # logtest-core
//!
//! logtest 세션 서버의 공통 기반 크레이트입니다.
//!
//! - [`config`]: `logtest.toml` 설정 로딩, 환경변수 오버라이드, 검증
//! - [`error`]: 도메인별 에러 타입
//! - [`protocol`]: 요청 파싱/분류, 진단 메시지, 응답 코드, 길이 구분 프레임 코덱
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogtestError, ProtocolError, SessionError};

// 설정
pub use config::LogtestConfig;

// 프로토콜
pub use protocol::{
    Diagnostic, DiagnosticLevel, Diagnostics, EventPayload, LogRequest, Request, Response,
    ResponseCode, TOKEN_LENGTH, is_valid_token,
};
