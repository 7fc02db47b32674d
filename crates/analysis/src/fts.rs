//! First-time-seen 테이블 -- 이전에 관찰된 값 조합을 기억하는 고정 크기 집합
//!
//! 용량을 넘으면 가장 오래된 키부터 잊습니다.
//! 룰의 `if_fts` 검사와 `ignore_fields` 중복 억제에 함께 쓰입니다.

use std::collections::{HashSet, VecDeque};

/// 고정 크기 FIFO 집합
#[derive(Debug, Clone)]
pub struct SeenSet {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// 처음 보는 키면 기록하고 `true`를 반환합니다.
    pub fn insert_if_new(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.to_owned());
        self.order.push_back(key.to_owned());
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// FTS 키: 디코더 이름과 지정된 필드 값들
///
/// 필드 중 하나라도 없으면 `None`입니다.
pub fn fts_key<'a>(
    decoder: &str,
    fields: &[String],
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Option<String> {
    let mut key = decoder.to_owned();
    for field in fields {
        key.push('\u{1f}');
        key.push_str(lookup(field)?);
    }
    Some(key)
}
