//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logtest_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 요청 종류 레이블 키 (log, remove_session, rejected)
pub const LABEL_REQUEST_KIND: &str = "kind";

/// 응답 코드 레이블 키 (success, warning, input-error, process-error)
pub const LABEL_CODE: &str = "code";

// ─── 요청 처리 메트릭 ────────────────────────────────────────────

/// 처리한 요청 수 (counter, label: kind)
pub const REQUESTS_TOTAL: &str = "logtest_requests_total";

/// 에러 코드로 끝난 요청 수 (counter, label: code)
pub const REQUEST_ERRORS_TOTAL: &str = "logtest_request_errors_total";

/// 요청 처리 시간 (histogram, 초)
pub const REQUEST_DURATION_SECONDS: &str = "logtest_request_duration_seconds";

/// 생성된 알림 수 (counter)
pub const ALERTS_TOTAL: &str = "logtest_alerts_total";

/// 크기 초과 등 프레임 계층에서 거부된 연결 수 (counter)
pub const FRAME_ERRORS_TOTAL: &str = "logtest_frame_errors_total";

// ─── 세션 메트릭 ────────────────────────────────────────────

/// 현재 세션 수 (gauge)
pub const SESSIONS_ACTIVE: &str = "logtest_sessions_active";

/// 생성된 세션 수 (counter)
pub const SESSIONS_CREATED_TOTAL: &str = "logtest_sessions_created_total";

/// 용량 초과로 축출된 세션 수 (counter)
pub const SESSIONS_EVICTED_TOTAL: &str = "logtest_sessions_evicted_total";

/// 유휴 타임아웃으로 만료된 세션 수 (counter)
pub const SESSIONS_EXPIRED_TOTAL: &str = "logtest_sessions_expired_total";

/// 클라이언트 요청으로 삭제된 세션 수 (counter)
pub const SESSIONS_REMOVED_TOTAL: &str = "logtest_sessions_removed_total";

// ─── 데몬 메트릭 ────────────────────────────────────────────

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logtest_daemon_uptime_seconds";

/// 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "logtest_daemon_build_info";

/// 요청 처리 시간 히스토그램 버킷 (초)
pub const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
];

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(REQUESTS_TOTAL, "Total number of logtest requests handled");
    describe_counter!(
        REQUEST_ERRORS_TOTAL,
        "Total number of requests answered with an error code"
    );
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time to handle a single logtest request in seconds"
    );
    describe_counter!(ALERTS_TOTAL, "Total number of alerts generated");
    describe_counter!(
        FRAME_ERRORS_TOTAL,
        "Total number of connections rejected at the framing layer"
    );

    describe_gauge!(SESSIONS_ACTIVE, "Number of sessions currently in the table");
    describe_counter!(SESSIONS_CREATED_TOTAL, "Total number of sessions created");
    describe_counter!(
        SESSIONS_EVICTED_TOTAL,
        "Total number of sessions evicted because the table was full"
    );
    describe_counter!(
        SESSIONS_EXPIRED_TOTAL,
        "Total number of sessions reaped after the idle timeout"
    );
    describe_counter!(
        SESSIONS_REMOVED_TOTAL,
        "Total number of sessions removed by client request"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "logtest daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
