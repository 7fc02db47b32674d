//! 상관관계 상태 -- 세션 이벤트 히스토리와 "이전 매칭" 리스트
//!
//! 이벤트는 ID로 관리되는 아레나에 한 번만 저장됩니다.
//! - 히스토리: 매칭되어 보관된 이벤트 ID의 FIFO (`history_size` 상한)
//! - 매칭 리스트: 룰 ID 또는 그룹별 이벤트 ID 링 버퍼 (`list_size` 상한)
//! - 링크 테이블: 이벤트 ID → 그 이벤트가 들어 있는 리스트 키
//!
//! 히스토리에서 밀려난 이벤트는 링크 테이블을 따라 모든 매칭 리스트에서 제거되므로
//! 매칭 리스트는 항상 살아 있는 이벤트만 가리킵니다.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::error::AnalysisError;
use crate::event::{Event, EventId};

/// 매칭 리스트 키
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    /// `if_matched_sid`가 참조하는 룰
    Sid(u32),
    /// `if_matched_group`이 참조하는 그룹
    Group(String),
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sid(id) => write!(f, "sid {id}"),
            Self::Group(name) => write!(f, "group '{name}'"),
        }
    }
}

/// 세션 상관관계 상태
#[derive(Debug)]
pub struct CorrelationState {
    events: HashMap<EventId, Event>,
    history: VecDeque<EventId>,
    history_size: usize,
    lists: HashMap<ListKey, VecDeque<EventId>>,
    list_size: usize,
    links: HashMap<EventId, Vec<ListKey>>,
    next_id: EventId,
}

impl CorrelationState {
    /// 룰셋이 참조하는 리스트 키로 상태를 만듭니다.
    pub fn new(
        history_size: usize,
        list_size: usize,
        keys: impl IntoIterator<Item = ListKey>,
    ) -> Self {
        Self {
            events: HashMap::new(),
            history: VecDeque::with_capacity(history_size),
            history_size: history_size.max(1),
            lists: keys.into_iter().map(|k| (k, VecDeque::new())).collect(),
            list_size: list_size.max(1),
            links: HashMap::new(),
            next_id: 0,
        }
    }

    /// 이벤트를 히스토리에 추가하고 ID를 반환합니다.
    ///
    /// 히스토리가 가득 차면 가장 오래된 이벤트와 그 링크를 제거합니다.
    pub fn push_history(&mut self, event: Event) -> EventId {
        if self.history.len() >= self.history_size {
            if let Some(oldest) = self.history.pop_front() {
                self.evict(oldest);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.events.insert(id, event);
        self.history.push_back(id);
        id
    }

    /// 히스토리에 있는 이벤트를 매칭 리스트에 연결합니다.
    pub fn link(&mut self, id: EventId, key: &ListKey) -> Result<(), AnalysisError> {
        if !self.events.contains_key(&id) {
            return Err(AnalysisError::MissingList(format!("event {id} is not in history")));
        }
        let list = self
            .lists
            .get_mut(key)
            .ok_or_else(|| AnalysisError::MissingList(key.to_string()))?;

        if list.len() >= self.list_size {
            if let Some(dropped) = list.pop_front() {
                // 리스트에서만 빠지고 히스토리에는 남습니다.
                if let Some(keys) = self.links.get_mut(&dropped) {
                    keys.retain(|k| k != key);
                }
            }
        }
        list.push_back(id);
        self.links.entry(id).or_default().push(key.clone());
        Ok(())
    }

    /// 매칭 리스트의 이벤트를 최신순으로 순회합니다.
    pub fn recent<'a>(&'a self, key: &ListKey) -> impl Iterator<Item = &'a Event> + 'a {
        self.lists
            .get(key)
            .into_iter()
            .flat_map(|list| list.iter().rev())
            .filter_map(|id| self.events.get(id))
    }

    pub fn has_list(&self, key: &ListKey) -> bool {
        self.lists.contains_key(key)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn list_len(&self, key: &ListKey) -> usize {
        self.lists.get(key).map_or(0, VecDeque::len)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    fn evict(&mut self, id: EventId) {
        self.events.remove(&id);
        for key in self.links.remove(&id).unwrap_or_default() {
            if let Some(list) = self.lists.get_mut(&key) {
                list.retain(|x| *x != id);
            }
        }
    }
}
