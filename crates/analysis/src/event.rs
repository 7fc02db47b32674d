//! 이벤트 타입 -- 요청 하나의 처리 과정 동안 사용되는 구조화된 로그
//!
//! 전처리 단계에서 생성되고, 디코더가 필드를 채우며, 룰 매칭 결과가 기록됩니다.
//! 룰이 상태 추적을 요구하면 세션의 상관관계 저장소로 복사본이 넘어갑니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 세션 내 이벤트 식별자
pub type EventId = u64;

/// 디코더/룰 카테고리
///
/// 루트 룰은 이벤트의 카테고리와 같을 때만 평가됩니다.
/// 디코딩되지 않은 이벤트는 [`Category::Syslog`]로 취급합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[default]
    Syslog,
    Firewall,
    Ids,
    WebLog,
    Squid,
    Windows,
    HostInformation,
    Ossec,
}

/// 이벤트에 매칭된 디코더 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderMatch {
    /// 출력에 쓰이는 디코더 이름 (자식 디코더는 기본적으로 부모 이름)
    pub name: String,
    /// 부모 디코더 이름
    pub parent: Option<String>,
    pub category: Category,
    /// 누적기 사용 여부
    pub accumulate: bool,
    /// FTS 키를 구성하는 필드
    pub fts: Vec<String>,
}

/// 파이프라인 이벤트
#[derive(Debug, Clone)]
pub struct Event {
    /// 출력용 알림 ID (`{epoch}.{seq}`)
    pub alert_id: String,
    /// 요청의 location
    pub location: String,
    /// 헤더를 포함한 이벤트 원문
    pub full_log: String,
    /// syslog 헤더를 제거한 메시지 본문
    pub log: String,
    pub hostname: Option<String>,
    pub program_name: Option<String>,
    pub pid: Option<String>,
    /// syslog 헤더의 원본 타임스탬프 문자열
    pub header_timestamp: Option<String>,
    /// 처리 시각
    pub generate_time: DateTime<Utc>,
    /// 디코더가 추출한 동적 필드 (삽입 순서 유지)
    pub fields: Vec<(String, String)>,
    /// `None`이면 디코딩되지 않은 이벤트
    pub decoder: Option<DecoderMatch>,
    /// 최종 매칭된 룰 (세션 룰 트리 인덱스)
    pub generated_rule: Option<usize>,
    /// 상관관계 룰이 참조한 이전 이벤트 원문
    pub previous_output: Vec<String>,
}

impl Event {
    pub fn new(location: String, full_log: String, generate_time: DateTime<Utc>) -> Self {
        Self {
            alert_id: String::new(),
            location,
            log: full_log.clone(),
            full_log,
            hostname: None,
            program_name: None,
            pid: None,
            header_timestamp: None,
            generate_time,
            fields: Vec::new(),
            decoder: None,
            generated_rule: None,
            previous_output: Vec::new(),
        }
    }

    /// 이벤트 카테고리
    pub fn category(&self) -> Category {
        self.decoder.as_ref().map(|d| d.category).unwrap_or_default()
    }

    /// 디코더 이름
    pub fn decoder_name(&self) -> Option<&str> {
        self.decoder.as_ref().map(|d| d.name.as_str())
    }

    /// 필드 값 조회. 동적 필드를 먼저 찾고, 없으면 정적 필드를 찾습니다.
    pub fn field(&self, name: &str) -> Option<&str> {
        if let Some((_, value)) = self.fields.iter().find(|(k, _)| k == name) {
            return Some(value.as_str());
        }
        match name {
            "hostname" => self.hostname.as_deref(),
            "program_name" => self.program_name.as_deref(),
            "location" => Some(self.location.as_str()),
            "full_log" => Some(self.full_log.as_str()),
            "log" => Some(self.log.as_str()),
            _ => None,
        }
    }

    /// 필드를 추가하거나 덮어씁니다.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        let mut event = Event::new(
            "/var/log/auth.log".to_owned(),
            "Jul 1 12:00:00 host sshd: Failed password for root".to_owned(),
            Utc::now(),
        );
        event.hostname = Some("host".to_owned());
        event.program_name = Some("sshd".to_owned());
        event
    }

    #[test]
    fn undecoded_event_is_syslog_category() {
        assert_eq!(sample_event().category(), Category::Syslog);
        assert!(sample_event().decoder_name().is_none());
    }

    #[test]
    fn field_lookup_prefers_dynamic_fields() {
        let mut event = sample_event();
        assert_eq!(event.field("hostname"), Some("host"));
        event.set_field("hostname", "decoded-host");
        assert_eq!(event.field("hostname"), Some("decoded-host"));
        assert_eq!(event.field("location"), Some("/var/log/auth.log"));
        assert_eq!(event.field("srcip"), None);
    }

    #[test]
    fn set_field_overwrites_in_place() {
        let mut event = sample_event();
        event.set_field("user", "root");
        event.set_field("srcip", "10.0.0.5");
        event.set_field("user", "admin");
        assert_eq!(
            event.fields,
            vec![
                ("user".to_owned(), "admin".to_owned()),
                ("srcip".to_owned(), "10.0.0.5".to_owned()),
            ]
        );
    }

    #[test]
    fn category_deserializes_kebab_case() {
        let category: Category = serde_yaml::from_str("web-log").unwrap();
        assert_eq!(category, Category::WebLog);
    }
}
