//! 전처리 단계 -- 요청을 정규화된 로그 라인으로 만들고 syslog 헤더를 분리합니다.
//!
//! 정규화 형식: `{queue}:{location}:{message}`
//! location 안의 `|` 는 `||` 로, `:` 는 `|:` 로 이스케이프됩니다.
//!
//! 지원하는 헤더:
//! - BSD syslog: `Jul  1 12:00:00 host sshd[123]: message`
//! - ISO 8601: `2024-07-01T12:00:00.123+00:00 host sshd[123]: message`
//! - 두 형식 모두 앞에 `<pri>`가 붙을 수 있습니다.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use regex::Regex;

use logtest_core::protocol::LogRequest;

use crate::error::AnalysisError;
use crate::event::Event;

/// 로컬 파일 큐 태그
pub const LOCALFILE_QUEUE: char = '1';

/// 헤더 파싱 결과
#[derive(Debug, Clone, PartialEq, Eq)]
struct SyslogHeader {
    timestamp: String,
    hostname: String,
    program_name: Option<String>,
    pid: Option<String>,
    message: String,
}

/// 전처리기 -- 헤더 정규식을 한 번만 컴파일해 재사용합니다.
#[derive(Debug)]
pub struct Preprocessor {
    bsd: Regex,
    iso: Regex,
    program: Regex,
}

impl Preprocessor {
    pub fn new() -> Result<Self, AnalysisError> {
        Ok(Self {
            bsd: Regex::new(
                r"^(?:<\d{1,3}>)?([A-Z][a-z]{2} {1,2}\d{1,2} \d{2}:\d{2}:\d{2}) (\S+) (?s)(.*)$",
            )?,
            iso: Regex::new(
                r"^(?:<\d{1,3}>)?(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?) (\S+) (?s)(.*)$",
            )?,
            program: Regex::new(r"^([^\s\[\]:]+)(?:\[(\d+)\])?: ?(?s)(.*)$")?,
        })
    }

    /// 요청을 이벤트로 변환합니다.
    ///
    /// location 또는 이벤트 본문이 비어 있으면 [`AnalysisError::Format`]을 반환합니다.
    pub fn preprocess(
        &self,
        request: &LogRequest,
        now: DateTime<Utc>,
    ) -> Result<Event, AnalysisError> {
        let line = build_line(LOCALFILE_QUEUE, &request.location, &request.event.to_log_text());
        self.clean_message(&line, now)
    }

    /// 정규화된 라인을 파싱하여 이벤트를 만듭니다.
    pub fn clean_message(&self, line: &str, now: DateTime<Utc>) -> Result<Event, AnalysisError> {
        let (location, message) = split_line(line)?;
        if message.trim().is_empty() {
            return Err(AnalysisError::Format {
                reason: "event is empty".to_owned(),
            });
        }

        let mut event = Event::new(location, message.to_owned(), now);

        if let Some(header) = self.parse_header(message, now) {
            event.header_timestamp = Some(header.timestamp);
            event.hostname = Some(header.hostname);
            event.program_name = header.program_name;
            event.pid = header.pid;
            event.log = header.message;
        }

        Ok(event)
    }

    fn parse_header(&self, message: &str, now: DateTime<Utc>) -> Option<SyslogHeader> {
        let (timestamp, hostname, rest) = if let Some(caps) = self.bsd.captures(message) {
            let timestamp = caps.get(1)?.as_str();
            if !is_valid_bsd_timestamp(timestamp, now) {
                return None;
            }
            (timestamp, caps.get(2)?.as_str(), caps.get(3)?.as_str())
        } else if let Some(caps) = self.iso.captures(message) {
            (
                caps.get(1)?.as_str(),
                caps.get(2)?.as_str(),
                caps.get(3)?.as_str(),
            )
        } else {
            return None;
        };

        let (program_name, pid, body) = match self.program.captures(rest) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().to_owned()),
                caps.get(2).map(|m| m.as_str().to_owned()),
                caps.get(3).map_or("", |m| m.as_str()),
            ),
            None => (None, None, rest),
        };

        Some(SyslogHeader {
            timestamp: timestamp.to_owned(),
            hostname: hostname.to_owned(),
            program_name,
            pid,
            message: body.to_owned(),
        })
    }
}

/// `{queue}:{location}:{message}` 라인을 만듭니다.
pub fn build_line(queue: char, location: &str, message: &str) -> String {
    format!(
        "{queue}:{}:{message}",
        location.replace('|', "||").replace(':', "|:")
    )
}

/// 정규화 라인을 (location, message)로 분리합니다.
fn split_line(line: &str) -> Result<(String, &str), AnalysisError> {
    let mut chars = line.char_indices();
    match (chars.next(), chars.next()) {
        (Some((_, queue)), Some((_, ':'))) if queue.is_ascii_digit() => {}
        _ => {
            return Err(AnalysisError::Format {
                reason: "missing queue tag".to_owned(),
            });
        }
    }

    let rest = &line[2..];
    let bytes = rest.as_bytes();
    let mut location = String::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'|' if matches!(bytes.get(i + 1), Some(b':' | b'|')) => {
                location.push(char::from(bytes[i + 1]));
                i += 2;
            }
            b':' => {
                if location.is_empty() {
                    return Err(AnalysisError::Format {
                        reason: "location is empty".to_owned(),
                    });
                }
                return Ok((location, &rest[i + 1..]));
            }
            _ => {
                // 다중 바이트 문자도 그대로 복사
                let ch_len = rest[i..].chars().next().map_or(1, char::len_utf8);
                location.push_str(&rest[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    Err(AnalysisError::Format {
        reason: "missing location separator".to_owned(),
    })
}

/// BSD 타임스탬프가 실제 날짜인지 확인합니다.
///
/// 연도 정보가 없으므로 현재 연도를 가정합니다.
fn is_valid_bsd_timestamp(timestamp: &str, now: DateTime<Utc>) -> bool {
    let normalized = timestamp.split_whitespace().collect::<Vec<_>>().join(" ");
    let with_year = format!("{} {normalized}", now.year());
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S").is_ok()
}
