//! 요청/응답 프로토콜 -- 요청 파싱, 진단 메시지, 응답 코드, 프레임 코덱
//!
//! 연결 하나당 요청 하나, 응답 하나를 주고받습니다.
//! 프레임은 4바이트 little-endian 길이 헤더 뒤에 JSON 본문이 오는 형식입니다.
//!
//! # 요청
//! ```json
//! {"event": "...", "location": "/var/log/auth.log", "log_format": "syslog", "token": "1a2b3c4d"}
//! {"remove_session": "1a2b3c4d"}
//! ```
//!
//! # 응답
//! ```json
//! {"token": "1a2b3c4d", "messages": ["INFO: ..."], "output": {...}, "alert": false, "error": 0}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::codec::{LengthDelimitedCodec, length_delimited::LengthDelimitedCodecError};

/// 세션 토큰 길이 (16진수 문자 수)
pub const TOKEN_LENGTH: usize = 8;

/// JSON 파싱 에러 위치 주변으로 보여줄 발췌 길이
pub const JSON_PARSE_EXCERPT_LEN: usize = 20;

/// 요청 하나에 기록되는 진단 메시지 최대 개수
pub const MAX_DIAGNOSTICS: usize = 64;

/// 프레임 길이 헤더 크기 (바이트)
pub const FRAME_HEADER_LEN: usize = 4;

pub const FIELD_EVENT: &str = "event";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_LOG_FORMAT: &str = "log_format";
pub const FIELD_TOKEN: &str = "token";
pub const FIELD_REMOVE_SESSION: &str = "remove_session";

/// 토큰 형식 검사: 정확히 [`TOKEN_LENGTH`]개의 16진수 문자
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

// =============================================================================
// 응답 코드 / 진단 메시지
// =============================================================================

/// 응답 코드
///
/// 심각도 순으로 정렬되며, 응답의 `error` 필드는 요청 처리 중 관찰된 최대값입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ResponseCode {
    /// 정상 처리
    #[default]
    Success = 0,
    /// 복구 가능한 이상 (만료/잘못된 토큰, 없는 세션 삭제 등)
    Warning = 1,
    /// 잘못된 요청 (요청 거부)
    InputError = 2,
    /// 처리 실패 (세션 생성 실패, 파이프라인 에러)
    ProcessError = 3,
}

impl ResponseCode {
    /// 와이어 표현
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// 와이어 표현에서 변환합니다.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::Warning),
            2 => Some(Self::InputError),
            3 => Some(Self::ProcessError),
            _ => None,
        }
    }

    /// 요청이 거부되었거나 처리에 실패한 코드인지 여부
    pub fn is_error(self) -> bool {
        self >= Self::InputError
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::InputError => write!(f, "input-error"),
            Self::ProcessError => write!(f, "process-error"),
        }
    }
}

/// 진단 메시지 심각도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// 진단 메시지 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.prefix(), self.message)
    }
}

/// 요청 단위 진단 메시지 수집기
///
/// 메시지 순서를 유지하며, 기록된 메시지에 따라 응답 코드를 올립니다.
/// 에러 메시지는 기본적으로 처리 실패([`ResponseCode::ProcessError`])로 취급하고,
/// 요청 검증 실패는 [`Diagnostics::input_error`]로 기록합니다.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    code: ResponseCode,
    dropped: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Warning, message.into());
        self.raise(ResponseCode::Warning);
    }

    /// 처리 실패 메시지
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, message.into());
        self.raise(ResponseCode::ProcessError);
    }

    /// 요청 검증 실패 메시지
    pub fn input_error(&mut self, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, message.into());
        self.raise(ResponseCode::InputError);
    }

    /// 응답 코드를 최소 `code` 이상으로 올립니다.
    pub fn raise(&mut self, code: ResponseCode) {
        self.code = self.code.max(code);
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 상한을 넘어 버려진 메시지 수
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// 응답의 `messages` 배열 형태로 렌더링합니다.
    pub fn render(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    fn push(&mut self, level: DiagnosticLevel, message: String) {
        tracing::debug!(level = level.prefix(), message = %message, "request diagnostic");
        if self.entries.len() >= MAX_DIAGNOSTICS {
            self.dropped += 1;
            return;
        }
        self.entries.push(Diagnostic { level, message });
    }
}

// =============================================================================
// 요청
// =============================================================================

/// 이벤트 본문: 원문 문자열 또는 구조화된 JSON 객체
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Text(String),
    Object(Map<String, Value>),
}

impl EventPayload {
    /// 파이프라인에 넘길 텍스트 형태. 객체는 compact JSON으로 재직렬화합니다.
    pub fn to_log_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Object(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

/// 로그 처리 요청
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    pub event: EventPayload,
    pub location: String,
    pub log_format: String,
    /// 형식 검사를 통과한 토큰만 남습니다.
    pub token: Option<String>,
}

/// 분류가 끝난 요청
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Log(LogRequest),
    RemoveSession { token: String },
}

impl Request {
    /// 원시 요청 바이트를 파싱하고 분류합니다.
    ///
    /// 거부된 요청은 `None`을 반환하며, 거부 사유는 모두 `diags`에 기록됩니다.
    /// 잘못된 형식의 `token`은 경고와 함께 제거되고 요청은 계속 처리됩니다.
    pub fn parse(raw: &[u8], diags: &mut Diagnostics) -> Option<Self> {
        let root = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                diags.input_error("Error parsing JSON: request must be a JSON object");
                return None;
            }
            Err(e) => {
                let offset = json_error_offset(raw, &e);
                diags.input_error("Error parsing JSON");
                diags.input_error(format!(
                    "Error in position {offset}, ... {} ...",
                    json_error_excerpt(raw, offset)
                ));
                return None;
            }
        };

        if let Some(value) = root.get(FIELD_REMOVE_SESSION) {
            return Self::classify_remove(value, diags);
        }
        Self::classify_log(root, diags)
    }

    fn classify_remove(value: &Value, diags: &mut Diagnostics) -> Option<Self> {
        match value {
            Value::String(token) if token.len() == TOKEN_LENGTH => Some(Self::RemoveSession {
                token: token.clone(),
            }),
            Value::String(token) => {
                diags.input_error(format!("Invalid token '{token}'"));
                None
            }
            other => {
                diags.input_error(format!(
                    "'{FIELD_REMOVE_SESSION}' JSON field must be a string, got {}",
                    json_type_name(other)
                ));
                None
            }
        }
    }

    fn classify_log(mut root: Map<String, Value>, diags: &mut Diagnostics) -> Option<Self> {
        // 누락된 필드를 모두 보고한 뒤에 거부합니다.
        let location = required_string(&root, FIELD_LOCATION, diags);
        let log_format = required_string(&root, FIELD_LOG_FORMAT, diags);

        let event = match root.remove(FIELD_EVENT) {
            Some(Value::String(text)) if !text.is_empty() => Some(EventPayload::Text(text)),
            Some(Value::Object(map)) if !map.is_empty() => Some(EventPayload::Object(map)),
            _ => {
                diags.input_error(format!(
                    "'{FIELD_EVENT}' JSON field is required and must be a non-empty string or object"
                ));
                None
            }
        };

        let token = match root.remove(FIELD_TOKEN) {
            None => None,
            Some(Value::String(token)) if is_valid_token(&token) => Some(token),
            Some(Value::String(token)) => {
                diags.warn(format!("'{token}' is not a valid token"));
                None
            }
            Some(other) => {
                diags.warn(format!("'{other}' is not a valid token"));
                None
            }
        };

        Some(Self::Log(LogRequest {
            event: event?,
            location: location?,
            log_format: log_format?,
            token,
        }))
    }
}

fn required_string(root: &Map<String, Value>, field: &str, diags: &mut Diagnostics) -> Option<String> {
    match root.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => {
            diags.input_error(format!(
                "'{field}' JSON field is required and must be a non-empty string"
            ));
            None
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// serde_json 에러의 (line, column)을 입력 내 바이트 오프셋으로 변환합니다.
///
/// 입력 끝에서 발생한 에러는 입력 길이로 고정됩니다.
pub fn json_error_offset(raw: &[u8], err: &serde_json::Error) -> usize {
    let line = err.line();
    let column = err.column();
    if line == 0 {
        return 0;
    }

    let mut line_start = 0usize;
    let mut current_line = 1usize;
    for (i, b) in raw.iter().enumerate() {
        if current_line == line {
            break;
        }
        if *b == b'\n' {
            current_line += 1;
            line_start = i + 1;
        }
    }
    (line_start + column.saturating_sub(1)).min(raw.len())
}

/// 에러 위치를 중심으로 최대 [`JSON_PARSE_EXCERPT_LEN`] 바이트를 잘라냅니다.
pub fn json_error_excerpt(raw: &[u8], offset: usize) -> String {
    let start = offset.saturating_sub(JSON_PARSE_EXCERPT_LEN / 2).min(raw.len());
    let end = (start + JSON_PARSE_EXCERPT_LEN).min(raw.len());
    String::from_utf8_lossy(&raw[start..end]).into_owned()
}

// =============================================================================
// 응답
// =============================================================================

/// 요청 처리 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<bool>,
    /// 최대 심각도 응답 코드
    pub error: i32,
}

impl Response {
    /// 진단 메시지만 담은 응답을 만듭니다.
    pub fn from_diagnostics(diags: &Diagnostics) -> Self {
        Self {
            messages: diags.render(),
            error: diags.code().as_i32(),
            ..Default::default()
        }
    }

    /// 프레임 계층 실패(크기 초과 등)에 대한 응답
    pub fn frame_error(message: impl Into<String>) -> Self {
        let mut diags = Diagnostics::new();
        diags.input_error(message);
        Self::from_diagnostics(&diags)
    }

    pub fn code(&self) -> Option<ResponseCode> {
        ResponseCode::from_i32(self.error)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::error::ProtocolError> {
        serde_json::to_vec(self).map_err(|e| crate::error::ProtocolError::Encode {
            reason: e.to_string(),
        })
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, crate::error::ProtocolError> {
        serde_json::from_slice(raw).map_err(|e| crate::error::ProtocolError::Decode {
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// 프레임 코덱
// =============================================================================

/// 요청/응답 프레임 코덱 (4바이트 little-endian 길이 헤더)
///
/// `max_frame_length`를 넘는 프레임은 디코딩 시 `InvalidData` I/O 에러가 됩니다.
pub fn frame_codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(FRAME_HEADER_LEN)
        .little_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// 코덱 에러가 프레임 크기 초과로 인한 것인지 확인합니다.
pub fn is_frame_too_large(err: &std::io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>())
}
