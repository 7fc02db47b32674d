//! 누적기 -- 여러 줄에 걸친 이벤트의 필드를 하나로 합칩니다.
//!
//! `accumulate`가 켜진 디코더로 디코딩된 이벤트는 `id` 필드를 기준으로 묶입니다.
//! 키는 `{hostname} {id} {location}` 형식입니다.
//!
//! - 이벤트에 없는 필드는 저장된 값으로 채웁니다.
//! - 합쳐진 필드 집합을 다시 저장합니다.
//! - [`ENTRY_TIMEOUT`]보다 오래된 항목은 무시되고, [`PURGE_INTERVAL`]마다 일괄 정리됩니다.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;

/// 누적 항목 유효 시간
pub const ENTRY_TIMEOUT: Duration = Duration::seconds(120);

/// 만료 항목 일괄 정리 주기
pub const PURGE_INTERVAL: Duration = Duration::seconds(300);

/// 누적 키를 구성하는 필드 이름
pub const ACCUMULATE_ID_FIELD: &str = "id";

#[derive(Debug)]
struct Entry {
    fields: Vec<(String, String)>,
    updated: DateTime<Utc>,
}

/// 세션별 누적 저장소
#[derive(Debug)]
pub struct Accumulator {
    store: HashMap<String, Entry>,
    last_purge: DateTime<Utc>,
}

impl Accumulator {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            store: HashMap::new(),
            last_purge: now,
        }
    }

    /// 이벤트 필드를 누적 상태와 합칩니다.
    ///
    /// `id` 필드가 없는 이벤트는 변경하지 않습니다.
    pub fn accumulate(&mut self, event: &mut Event, now: DateTime<Utc>) {
        if now - self.last_purge >= PURGE_INTERVAL {
            self.purge(now);
        }

        let Some(key) = accumulate_key(event) else {
            tracing::trace!(location = %event.location, "accumulate skipped, no id field");
            return;
        };

        if let Some(entry) = self.store.get(&key) {
            if now - entry.updated < ENTRY_TIMEOUT {
                for (name, value) in &entry.fields {
                    if event.field(name).is_none() {
                        event.set_field(name.clone(), value.clone());
                    }
                }
            }
        }

        self.store.insert(
            key,
            Entry {
                fields: event.fields.clone(),
                updated: now,
            },
        );
    }

    /// 만료된 항목을 제거합니다.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        let before = self.store.len();
        self.store.retain(|_, entry| now - entry.updated < ENTRY_TIMEOUT);
        self.last_purge = now;
        let removed = before - self.store.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "accumulator purged");
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

fn accumulate_key(event: &Event) -> Option<String> {
    let id = event.field(ACCUMULATE_ID_FIELD)?;
    Some(format!(
        "{} {id} {}",
        event.hostname.as_deref().unwrap_or(""),
        event.location
    ))
}
