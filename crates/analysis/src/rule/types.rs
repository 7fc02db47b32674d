//! 룰 정의 타입
//!
//! YAML 룰 파일에서 역직렬화되는 구조체들을 정의합니다.
//! 룰 파일은 그룹 블록의 목록이며, 각 블록의 그룹 이름은 블록 안의 모든 룰에 붙습니다.
//!
//! # YAML 스키마
//! ```yaml
//! - group: [syslog, sshd]
//!   rules:
//!     - id: 5710
//!       level: 5
//!       decoded_as: sshd
//!       match: Failed password|Failed publickey
//!       description: "sshd: authentication failed for $(dstuser)"
//!       groups: [authentication_failed]
//!
//!     - id: 5712
//!       level: 10
//!       if_matched_sid: 5710
//!       frequency: 6
//!       timeframe: 120
//!       same_fields: [srcip]
//!       description: "sshd: brute force from $(srcip)"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use logtest_core::config::MAX_RULE_LEVEL;

use crate::error::AnalysisError;
use crate::event::Category;
use crate::lists::ListLookup;

/// `timeframe`/`ignore`의 최대값 (초, 1년)
pub const MAX_WINDOW_SECS: u64 = 31_536_000;

/// 룰 파일의 그룹 블록
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroupDef {
    /// 블록 안의 모든 룰에 붙는 그룹 이름
    #[serde(default)]
    pub group: Vec<String>,
    pub rules: Vec<RuleDef>,
}

/// 룰 정의
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDef {
    /// 룰 ID (세션 내 유일)
    pub id: u32,
    /// 심각도 (0은 무음)
    pub level: u8,
    /// 알림 설명. `$(field)`는 이벤트 필드 값으로 치환됩니다.
    pub description: String,
    /// 루트 룰의 카테고리. 생략하면 `syslog`
    #[serde(default)]
    pub category: Option<Category>,
    /// 디코더 이름 조건
    #[serde(default)]
    pub decoded_as: Option<String>,
    /// 프로그램 이름 정규식
    #[serde(default)]
    pub program_name: Option<String>,
    /// `|`로 구분된 부분 문자열 대안. `^`/`$`로 앞/뒤를 고정할 수 있습니다.
    #[serde(default, rename = "match")]
    pub match_pattern: Option<String>,
    /// 메시지 본문 정규식
    #[serde(default)]
    pub regex: Option<String>,
    /// 필드 이름 → 정규식
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// CDB 리스트 조회
    #[serde(default, rename = "list")]
    pub lists: Vec<ListCheckDef>,
    /// 부모 룰 ID
    #[serde(default)]
    pub if_sid: Vec<u32>,
    /// 부모 그룹
    #[serde(default)]
    pub if_group: Vec<String>,
    /// 이전에 매칭된 룰 ID
    #[serde(default)]
    pub if_matched_sid: Option<u32>,
    /// 이전에 매칭된 그룹
    #[serde(default)]
    pub if_matched_group: Option<String>,
    /// 이전 이벤트와 값이 같아야 하는 필드
    #[serde(default)]
    pub same_fields: Vec<String>,
    /// 이전 이벤트와 값이 달라야 하는 필드
    #[serde(default)]
    pub different_fields: Vec<String>,
    /// 발생 횟수 (현재 이벤트 포함)
    #[serde(default)]
    pub frequency: Option<u32>,
    /// 상관관계 시간 창 (초)
    #[serde(default)]
    pub timeframe: Option<u64>,
    /// 매칭 후 재알림을 억제할 시간 (초)
    #[serde(default)]
    pub ignore: Option<u64>,
    /// 이 필드 값 조합이 이미 알림을 냈으면 억제
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    /// 디코더 FTS 키가 처음 관찰된 경우에만 매칭
    #[serde(default)]
    pub if_fts: bool,
    /// 룰 그룹 (블록 그룹에 추가됨)
    #[serde(default)]
    pub groups: Vec<String>,
}

/// 룰의 리스트 조회 조건
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListCheckDef {
    /// 조회 키로 쓰이는 이벤트 필드
    pub field: String,
    pub lookup: ListLookup,
    /// 리스트 이름 (파일 이름에서 확장자를 뺀 값)
    pub name: String,
    /// `match_key_value`의 값 정규식
    #[serde(default)]
    pub value: Option<String>,
}

impl RuleDef {
    /// 상관관계(`if_matched_*`) 룰 여부
    pub fn is_correlated(&self) -> bool {
        self.if_matched_sid.is_some() || self.if_matched_group.is_some()
    }

    /// 룰 정의의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |reason: &str| AnalysisError::RuleValidation {
            rule_id: self.id,
            reason: reason.to_owned(),
        };

        if self.id == 0 {
            return Err(invalid("rule id must be greater than 0"));
        }

        if self.level > MAX_RULE_LEVEL {
            return Err(AnalysisError::RuleValidation {
                rule_id: self.id,
                reason: format!("level {} exceeds maximum {MAX_RULE_LEVEL}", self.level),
            });
        }

        if self.description.trim().is_empty() {
            return Err(invalid("description must not be empty"));
        }

        if self.if_matched_sid.is_some() && self.if_matched_group.is_some() {
            return Err(invalid(
                "if_matched_sid and if_matched_group are mutually exclusive",
            ));
        }

        if self.frequency.is_some() && !self.is_correlated() {
            return Err(invalid(
                "frequency requires if_matched_sid or if_matched_group",
            ));
        }

        if self.is_correlated() && self.timeframe.is_none_or(|t| t == 0) {
            return Err(invalid("if_matched_* requires a positive timeframe"));
        }

        if self.frequency.is_some_and(|f| f < 2) {
            return Err(invalid("frequency must be at least 2"));
        }

        if self.if_sid.contains(&self.id) || self.if_matched_sid == Some(self.id) {
            return Err(invalid("rule cannot reference itself"));
        }

        if self.ignore == Some(0) {
            return Err(invalid("ignore must be greater than 0"));
        }

        if self.timeframe.into_iter().chain(self.ignore).any(|t| t > MAX_WINDOW_SECS) {
            return Err(AnalysisError::RuleValidation {
                rule_id: self.id,
                reason: format!("timeframe and ignore must not exceed {MAX_WINDOW_SECS} seconds"),
            });
        }

        for check in &self.lists {
            if check.value.is_some() && check.lookup != ListLookup::MatchKeyValue {
                return Err(invalid("list 'value' is only valid with match_key_value"));
            }
        }

        Ok(())
    }
}
