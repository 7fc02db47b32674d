//! 설정 관리 -- logtest.toml 파싱 및 런타임 설정
//!
//! [`LogtestConfig`]는 데몬, 세션 서버, 분석 엔진의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGTEST_LOGTEST_THREADS=4` 형식)
//! 3. 설정 파일 (`logtest.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logtest_core::error::LogtestError> {
//! use logtest_core::config::LogtestConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogtestConfig::load("logtest.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogtestConfig::parse("[logtest]\nthreads = 4")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogtestError};

/// 워커 수 상한
pub const MAX_THREADS: usize = 128;
/// 동시 세션 수 상한
pub const MAX_SESSIONS: usize = 500;
/// 세션 유휴 타임아웃 상한 (1년)
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 31_536_000;
/// 요청 프레임 최소 크기
pub const MIN_MESSAGE_SIZE: usize = 1024;
/// 요청 프레임 최대 크기 (16 MiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
/// 룰 레벨 상한
pub const MAX_RULE_LEVEL: u8 = 16;
/// FTS 테이블 크기 범위
pub const FTS_LIST_SIZE_RANGE: (usize, usize) = (12, 512);

/// logtest 통합 설정
///
/// `logtest.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogtestConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 세션 서버 설정
    #[serde(default)]
    pub logtest: ServerConfig,
    /// 분석 엔진(디코더/룰/리스트) 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogtestConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogtestError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogtestError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogtestError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogtestError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogtestError> {
        toml::from_str(toml_str).map_err(|e| {
            LogtestError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGTEST_{SECTION}_{FIELD}`
    /// 예: `LOGTEST_LOGTEST_MAX_SESSIONS=128`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGTEST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGTEST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LOGTEST_GENERAL_PID_FILE");

        // Session server
        override_bool(&mut self.logtest.enabled, "LOGTEST_LOGTEST_ENABLED");
        override_usize(&mut self.logtest.threads, "LOGTEST_LOGTEST_THREADS");
        override_usize(
            &mut self.logtest.max_sessions,
            "LOGTEST_LOGTEST_MAX_SESSIONS",
        );
        override_u64(
            &mut self.logtest.session_timeout_secs,
            "LOGTEST_LOGTEST_SESSION_TIMEOUT_SECS",
        );
        override_string(&mut self.logtest.socket_path, "LOGTEST_LOGTEST_SOCKET_PATH");
        override_usize(
            &mut self.logtest.max_message_size,
            "LOGTEST_LOGTEST_MAX_MESSAGE_SIZE",
        );

        // Analysis
        override_csv(
            &mut self.analysis.decoder_paths,
            "LOGTEST_ANALYSIS_DECODER_PATHS",
        );
        override_csv(&mut self.analysis.rule_paths, "LOGTEST_ANALYSIS_RULE_PATHS");
        override_csv(&mut self.analysis.list_paths, "LOGTEST_ANALYSIS_LIST_PATHS");
        override_u8(
            &mut self.analysis.log_alert_level,
            "LOGTEST_ANALYSIS_LOG_ALERT_LEVEL",
        );
        override_usize(
            &mut self.analysis.history_size,
            "LOGTEST_ANALYSIS_HISTORY_SIZE",
        );
        override_usize(
            &mut self.analysis.match_list_size,
            "LOGTEST_ANALYSIS_MATCH_LIST_SIZE",
        );
        override_usize(
            &mut self.analysis.fts_list_size,
            "LOGTEST_ANALYSIS_FTS_LIST_SIZE",
        );
        override_string(
            &mut self.analysis.manager_name,
            "LOGTEST_ANALYSIS_MANAGER_NAME",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGTEST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGTEST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGTEST_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGTEST_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogtestError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.logtest.validate()?;
        self.analysis.validate()?;

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "port must not be 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 기록하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: "/var/run/logtest/logtest.pid".to_owned(),
        }
    }
}

/// 세션 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 요청을 처리하는 워커 수
    pub threads: usize,
    /// 동시에 유지할 수 있는 최대 세션 수
    pub max_sessions: usize,
    /// 세션 유휴 타임아웃 (초). 리퍼 주기와 같습니다.
    pub session_timeout_secs: u64,
    /// Unix 소켓 경로
    pub socket_path: String,
    /// 요청 프레임 최대 크기 (바이트)
    pub max_message_size: usize,
}

impl ServerConfig {
    /// 세션 유휴 타임아웃
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    fn validate(&self) -> Result<(), LogtestError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(invalid(
                "logtest.threads",
                format!("must be between 1 and {MAX_THREADS}"),
            ));
        }
        if self.max_sessions == 0 || self.max_sessions > MAX_SESSIONS {
            return Err(invalid(
                "logtest.max_sessions",
                format!("must be between 1 and {MAX_SESSIONS}"),
            ));
        }
        if self.session_timeout_secs == 0 || self.session_timeout_secs > MAX_SESSION_TIMEOUT_SECS {
            return Err(invalid(
                "logtest.session_timeout_secs",
                format!("must be between 1 and {MAX_SESSION_TIMEOUT_SECS}"),
            ));
        }
        if self.enabled && self.socket_path.is_empty() {
            return Err(invalid(
                "logtest.socket_path",
                "socket path must not be empty when logtest is enabled".to_owned(),
            ));
        }
        if self.max_message_size < MIN_MESSAGE_SIZE || self.max_message_size > MAX_MESSAGE_SIZE {
            return Err(invalid(
                "logtest.max_message_size",
                format!("must be between {MIN_MESSAGE_SIZE} and {MAX_MESSAGE_SIZE}"),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threads: 1,
            max_sessions: 64,
            session_timeout_secs: 900,
            socket_path: "/var/run/logtest/logtest.sock".to_owned(),
            max_message_size: 64 * 1024,
        }
    }
}

/// 분석 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 디코더 YAML 파일 또는 디렉토리
    pub decoder_paths: Vec<String>,
    /// 룰 YAML 파일 또는 디렉토리
    pub rule_paths: Vec<String>,
    /// CDB 리스트 파일 또는 디렉토리
    pub list_paths: Vec<String>,
    /// 알림을 생성하는 최소 룰 레벨
    pub log_alert_level: u8,
    /// 세션별 이벤트 히스토리 크기
    pub history_size: usize,
    /// 룰/그룹별 상관관계 리스트 크기
    pub match_list_size: usize,
    /// FTS(first-time-seen) 테이블 크기
    pub fts_list_size: usize,
    /// 출력에 기록할 매니저 이름
    pub manager_name: String,
}

impl AnalysisConfig {
    fn validate(&self) -> Result<(), LogtestError> {
        if self.log_alert_level > MAX_RULE_LEVEL {
            return Err(invalid(
                "analysis.log_alert_level",
                format!("must be between 0 and {MAX_RULE_LEVEL}"),
            ));
        }
        if self.history_size == 0 {
            return Err(invalid(
                "analysis.history_size",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.match_list_size == 0 {
            return Err(invalid(
                "analysis.match_list_size",
                "must be greater than 0".to_owned(),
            ));
        }
        let (min_fts, max_fts) = FTS_LIST_SIZE_RANGE;
        if self.fts_list_size < min_fts || self.fts_list_size > max_fts {
            return Err(invalid(
                "analysis.fts_list_size",
                format!("must be between {min_fts} and {max_fts}"),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            decoder_paths: vec!["/etc/logtest/decoders".to_owned()],
            rule_paths: vec!["/etc/logtest/rules".to_owned()],
            list_paths: Vec::new(),
            log_alert_level: 3,
            history_size: 256,
            match_list_size: 64,
            fts_list_size: 32,
            manager_name: "logtest".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 노출 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn invalid(field: &str, reason: String) -> LogtestError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u8(target: &mut u8, env_key: &str) {
    override_parsed(target, env_key, "u8");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
