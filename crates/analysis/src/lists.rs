//! CDB 리스트 -- 룰이 참조하는 키/값 조회 테이블
//!
//! 파일 형식은 한 줄에 `key:value` 하나이며 값은 생략할 수 있습니다.
//! `#`으로 시작하는 줄과 빈 줄은 무시합니다.
//! 리스트 이름은 파일 이름에서 확장자를 뺀 값입니다.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::source::{self, SourceKind};

/// 룰의 리스트 조회 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListLookup {
    /// 키가 존재하면 매칭
    MatchKey,
    /// 키가 없으면 매칭
    NotMatchKey,
    /// 키가 존재하고 값이 정규식에 매칭되면 매칭
    MatchKeyValue,
}

/// 이름이 붙은 리스트 하나
#[derive(Debug, Clone, Default)]
pub struct CdbList {
    entries: HashMap<String, String>,
}

impl CdbList {
    /// 리스트 파일 내용을 파싱합니다.
    pub fn parse(content: &str, source: &str) -> Result<Self, AnalysisError> {
        let mut entries = HashMap::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match split_entry(line) {
                Some(kv) => kv,
                None => (line.to_owned(), String::new()),
            };
            if key.is_empty() {
                return Err(AnalysisError::ListLoad {
                    path: source.to_owned(),
                    reason: format!("empty key on line {}", lineno + 1),
                });
            }
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `key:value` 분리. 따옴표로 감싼 키 안의 `:` 는 구분자가 아닙니다.
fn split_entry(line: &str) -> Option<(String, String)> {
    if let Some(rest) = line.strip_prefix('"') {
        let end = rest.find('"')?;
        let key = rest[..end].to_owned();
        let value = rest[end + 1..].strip_prefix(':').unwrap_or("").to_owned();
        return Some((key, value));
    }
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_owned(), value.trim().to_owned()))
}

/// 세션에 로드된 모든 리스트
#[derive(Debug, Clone, Default)]
pub struct CdbLists {
    lists: HashMap<String, CdbList>,
}

impl CdbLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// 파일 경로에서 리스트 이름을 만들어 등록합니다.
    pub fn insert_file(&mut self, path: &Path, list: CdbList) -> Result<(), AnalysisError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AnalysisError::ListLoad {
                path: path.display().to_string(),
                reason: "list file name is not valid UTF-8".to_owned(),
            })?
            .to_owned();
        if self.lists.contains_key(&name) {
            return Err(AnalysisError::ListLoad {
                path: path.display().to_string(),
                reason: format!("duplicate list name '{name}'"),
            });
        }
        self.lists.insert(name, list);
        Ok(())
    }

    /// 설정된 경로의 리스트 파일을 모두 로드합니다.
    pub async fn load_paths(paths: &[String]) -> Result<Self, AnalysisError> {
        let mut lists = Self::new();
        for path in source::collect_files(SourceKind::List, paths).await? {
            let content = source::read_source(SourceKind::List, &path).await?;
            let list = CdbList::parse(&content, &path.display().to_string())?;
            lists.insert_file(&path, list)?;
        }
        tracing::debug!(lists = lists.len(), "loaded cdb lists");
        Ok(lists)
    }

    /// 이름으로 리스트를 등록합니다.
    pub fn insert(&mut self, name: impl Into<String>, list: CdbList) {
        self.lists.insert(name.into(), list);
    }

    pub fn get(&self, name: &str) -> Option<&CdbList> {
        self.lists.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lists.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// 리스트 조회를 평가합니다. 존재하지 않는 리스트는 빈 리스트로 취급합니다.
    pub fn lookup(
        &self,
        list: &str,
        lookup: ListLookup,
        key: Option<&str>,
        value_pattern: Option<&Regex>,
    ) -> bool {
        let entry = key.and_then(|k| self.get(list).and_then(|l| l.get(k)));
        match lookup {
            ListLookup::MatchKey => entry.is_some(),
            ListLookup::NotMatchKey => entry.is_none(),
            ListLookup::MatchKeyValue => match (entry, value_pattern) {
                (Some(value), Some(re)) => re.is_match(value),
                (Some(_), None) => true,
                (None, _) => false,
            },
        }
    }
}
