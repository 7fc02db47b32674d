//! 룰 조건 매칭 -- 상태가 없는 조건 평가와 정규식 캐싱
//!
//! [`RuleMatcher`]는 룰 하나의 정적 조건(디코더, 프로그램 이름, match, regex, 필드, 리스트)을
//! 이벤트에 대해 평가합니다. 정규식은 룰 트리 생성 시 한 번만 컴파일합니다.
//! 상관관계와 FTS 같은 세션 상태 조건은 [`super::RuleTree`]가 처리합니다.

use regex::Regex;

use crate::error::AnalysisError;
use crate::event::Event;
use crate::lists::{CdbLists, ListLookup};

use super::types::RuleDef;

/// `match` 대안 하나의 고정 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
}

#[derive(Debug, Clone)]
struct Alternative {
    anchor: Anchor,
    needle: String,
}

/// `|`로 구분된 부분 문자열 대안 (대소문자 무시)
///
/// `^foo`는 접두사, `foo$`는 접미사, `^foo$`는 전체 일치입니다.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    alternatives: Vec<Alternative>,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Self {
        let alternatives = pattern
            .split('|')
            .map(|alt| {
                let (alt, head) = match alt.strip_prefix('^') {
                    Some(rest) => (rest, true),
                    None => (alt, false),
                };
                let (alt, tail) = match alt.strip_suffix('$') {
                    Some(rest) => (rest, true),
                    None => (alt, false),
                };
                let anchor = match (head, tail) {
                    (true, true) => Anchor::Equals,
                    (true, false) => Anchor::StartsWith,
                    (false, true) => Anchor::EndsWith,
                    (false, false) => Anchor::Contains,
                };
                Alternative {
                    anchor,
                    needle: alt.to_lowercase(),
                }
            })
            .collect();
        Self { alternatives }
    }

    pub fn is_match(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.alternatives.iter().any(|alt| match alt.anchor {
            Anchor::Contains => text.contains(&alt.needle),
            Anchor::StartsWith => text.starts_with(&alt.needle),
            Anchor::EndsWith => text.ends_with(&alt.needle),
            Anchor::Equals => text == alt.needle,
        })
    }
}

#[derive(Debug)]
struct ListCheck {
    field: String,
    lookup: ListLookup,
    name: String,
    value: Option<Regex>,
}

/// 룰 하나의 컴파일된 정적 조건
///
/// 모든 조건은 AND 결합입니다. 조건이 하나도 없으면 모든 이벤트에 매칭됩니다.
#[derive(Debug)]
pub struct RuleMatcher {
    decoded_as: Option<String>,
    program_name: Option<Regex>,
    match_pattern: Option<MatchPattern>,
    regex: Option<Regex>,
    fields: Vec<(String, Regex)>,
    lists: Vec<ListCheck>,
}

impl RuleMatcher {
    /// 룰 정의의 정규식을 컴파일합니다.
    pub fn compile(def: &RuleDef) -> Result<Self, AnalysisError> {
        let compile = |pattern: &str, what: &str| {
            Regex::new(pattern).map_err(|e| AnalysisError::RuleValidation {
                rule_id: def.id,
                reason: format!("invalid {what} regex: {e}"),
            })
        };

        let fields = def
            .fields
            .iter()
            .map(|(name, pattern)| -> Result<(String, Regex), AnalysisError> {
                Ok((name.clone(), compile(pattern, &format!("field '{name}'"))?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lists = def
            .lists
            .iter()
            .map(|check| -> Result<ListCheck, AnalysisError> {
                Ok(ListCheck {
                    field: check.field.clone(),
                    lookup: check.lookup,
                    name: check.name.clone(),
                    value: check
                        .value
                        .as_deref()
                        .map(|v| compile(v, "list value"))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            decoded_as: def.decoded_as.clone(),
            program_name: def
                .program_name
                .as_deref()
                .map(|p| compile(p, "program_name"))
                .transpose()?,
            match_pattern: def.match_pattern.as_deref().map(MatchPattern::parse),
            regex: def.regex.as_deref().map(|p| compile(p, "regex")).transpose()?,
            fields,
            lists,
        })
    }

    /// 룰이 참조하는 CDB 리스트 이름
    pub fn list_names(&self) -> impl Iterator<Item = &str> {
        self.lists.iter().map(|l| l.name.as_str())
    }

    /// 정적 조건을 평가합니다.
    pub fn matches(&self, event: &Event, lists: &CdbLists) -> bool {
        if let Some(decoder) = &self.decoded_as {
            if event.decoder_name() != Some(decoder.as_str()) {
                return false;
            }
        }

        if let Some(re) = &self.program_name {
            match event.program_name.as_deref() {
                Some(program) if re.is_match(program) => {}
                _ => return false,
            }
        }

        if let Some(pattern) = &self.match_pattern {
            if !pattern.is_match(&event.log) {
                return false;
            }
        }

        if let Some(re) = &self.regex {
            if !re.is_match(&event.log) {
                return false;
            }
        }

        // 필드가 없으면 매칭 실패
        for (name, re) in &self.fields {
            if !event.field(name).is_some_and(|v| re.is_match(v)) {
                return false;
            }
        }

        self.lists.iter().all(|check| {
            lists.lookup(
                &check.name,
                check.lookup,
                event.field(&check.field),
                check.value.as_ref(),
            )
        })
    }
}
